use crate::interpolation::{AdaptiveInterpolation, InterpolationSettings};
use bevy_reflect::Reflect;
use serde::{Deserialize, Serialize};

/// Which transform properties are interpolated.
///
/// Properties that are not smoothed snap to the newest consumed snapshot immediately.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub struct SmoothedProperties {
    pub position: bool,
    pub rotation: bool,
    pub scale: bool,
}

impl Default for SmoothedProperties {
    fn default() -> Self {
        Self::ALL
    }
}

impl SmoothedProperties {
    pub const ALL: Self = Self {
        position: true,
        rotation: true,
        scale: true,
    };

    pub const NONE: Self = Self {
        position: false,
        rotation: false,
        scale: false,
    };

    pub fn is_none(&self) -> bool {
        !(self.position || self.rotation || self.scale)
    }
}

/// Config to specify how the tick smoother should behave
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Reflect)]
#[serde(default)]
pub struct SmootherConfig {
    /// How many ticks of snapshots to buffer before playing them back
    pub interpolation: InterpolationSettings,
    /// Properties smoothed when the local peer controls the entity
    pub owner_properties: SmoothedProperties,
    /// Properties smoothed when the entity is controlled by someone else
    pub spectator_properties: SmoothedProperties,
    /// If the distance between two consecutive snapshots is at least this value, the rendered
    /// object snaps instead of interpolating. `None` disables teleporting.
    pub teleport_threshold: Option<f32>,
    /// If true, the rendered object is detached from the tick-driven object while smoothing,
    /// so that moving the tick-driven object does not drag it along.
    pub detach: bool,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            interpolation: InterpolationSettings::default(),
            owner_properties: SmoothedProperties::ALL,
            spectator_properties: SmoothedProperties::ALL,
            teleport_threshold: None,
            detach: false,
        }
    }
}

impl SmootherConfig {
    pub fn with_interpolation(mut self, interpolation: InterpolationSettings) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_adaptive_interpolation(mut self, adaptive: AdaptiveInterpolation) -> Self {
        self.interpolation.adaptive = adaptive;
        self
    }

    pub fn with_teleport_threshold(mut self, threshold: f32) -> Self {
        self.teleport_threshold = Some(threshold);
        self
    }

    pub fn with_detach(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    pub fn with_smoothed_properties(
        mut self,
        properties: SmoothedProperties,
        for_spectator: bool,
    ) -> Self {
        if for_spectator {
            self.spectator_properties = properties;
        } else {
            self.owner_properties = properties;
        }
        self
    }
}
