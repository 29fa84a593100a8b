//! World-space position/rotation/scale triple used as the unit of smoothing.
use bevy_math::{Quat, Vec3};
use bevy_reflect::Reflect;
use bevy_transform::components::Transform;

/// Tolerance used by [`Pose::approx_eq`] when callers don't have a more specific one
pub const POSE_TOLERANCE: f32 = 1e-4;

/// A position/rotation/scale triple.
///
/// An invalid pose carries no movement meaning: it must never be used as the start or the end
/// of an interpolation segment. Use [`Pose::is_valid`] before consuming one.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    valid: bool,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
        valid: true,
    };

    pub const INVALID: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
        valid: false,
    };

    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            valid: true,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Returns true if the pose was built as a valid pose and contains only finite values
    pub fn is_valid(&self) -> bool {
        self.valid
            && self.position.is_finite()
            && self.rotation.is_finite()
            && self.scale.is_finite()
    }

    /// Euclidean distance between the two positions
    pub fn distance(&self, other: &Pose) -> f32 {
        self.position.distance(other.position)
    }

    /// Angle in radians between the two rotations
    pub fn angle_to(&self, other: &Pose) -> f32 {
        self.rotation.angle_between(other.rotation)
    }

    /// Euclidean distance between the two scales
    pub fn scale_distance(&self, other: &Pose) -> f32 {
        self.scale.distance(other.scale)
    }

    pub fn approx_eq(&self, other: &Pose, tolerance: f32) -> bool {
        self.distance(other) <= tolerance
            && self.angle_to(other) <= tolerance
            && self.scale_distance(other) <= tolerance
    }

    /// Apply a pose expressed in the local space of `self`, returning the resulting world pose.
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose {
            position: self.position + self.rotation * (self.scale * local.position),
            rotation: self.rotation * local.rotation,
            scale: self.scale * local.scale,
            valid: self.valid && local.valid,
        }
    }

    /// Express `self` in the local space of `parent`. Inverse of [`Pose::compose`].
    pub fn relative_to(&self, parent: &Pose) -> Pose {
        let inverse_rotation = parent.rotation.inverse();
        let parent_scale = parent.scale.max(Vec3::splat(f32::EPSILON));
        Pose {
            position: (inverse_rotation * (self.position - parent.position)) / parent_scale,
            rotation: inverse_rotation * self.rotation,
            scale: self.scale / parent_scale,
            valid: self.valid && parent.valid,
        }
    }
}

impl From<Transform> for Pose {
    fn from(value: Transform) -> Self {
        Pose::new(value.translation, value.rotation, value.scale)
    }
}

impl From<&Pose> for Transform {
    fn from(value: &Pose) -> Self {
        Transform {
            translation: value.position,
            rotation: value.rotation,
            scale: value.scale,
        }
    }
}

/// Move `current` towards `target` by at most `max_delta` units
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let delta = target - current;
    let distance = delta.length();
    if distance <= max_delta || distance <= f32::EPSILON {
        return target;
    }
    current + delta / distance * max_delta
}

/// Rotate `current` towards `target` by at most `max_angle` radians
pub fn rotate_towards(current: Quat, target: Quat, max_angle: f32) -> Quat {
    let angle = current.angle_between(target);
    if angle <= max_angle || angle <= f32::EPSILON {
        return target;
    }
    current.slerp(target, max_angle / angle)
}
