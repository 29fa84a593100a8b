//! Computes how fast the rendered pose must move to reach the next snapshot in time.
use crate::config::SmoothedProperties;
use crate::error::{Result, SmoothingError};
use bevy_reflect::Reflect;
use tick_smoother_core::pose::{move_towards, rotate_towards, Pose};
use tracing::trace;

/// Speeds used to advance the rendered pose during one playback segment
/// (from the current buffer head to the next one).
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct MoveRate {
    /// Units per second
    pub position: f32,
    /// Radians per second
    pub rotation: f32,
    /// Scale units per second
    pub scale: f32,
    /// Number of ticks between the two endpoints of the segment (at least 1)
    pub tick_span: u32,
    /// Seconds left before the segment target is reached
    pub time_remaining: f32,
}

impl MoveRate {
    /// A segment that has nothing left to play
    pub fn completed() -> Self {
        Self {
            position: 0.0,
            rotation: 0.0,
            scale: 0.0,
            tick_span: 1,
            time_remaining: 0.0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.time_remaining <= 0.0
    }

    /// Advance `current` towards `target` for `delta` seconds.
    ///
    /// Properties that are not part of `smoothed` snap to the target right away.
    pub fn advance(
        &mut self,
        current: &Pose,
        target: &Pose,
        delta: f32,
        smoothed: SmoothedProperties,
    ) -> Pose {
        let mut next = *current;
        next.position = if smoothed.position {
            move_towards(current.position, target.position, self.position * delta)
        } else {
            target.position
        };
        next.rotation = if smoothed.rotation {
            rotate_towards(current.rotation, target.rotation, self.rotation * delta)
        } else {
            target.rotation
        };
        next.scale = if smoothed.scale {
            move_towards(current.scale, target.scale, self.scale * delta)
        } else {
            target.scale
        };
        self.time_remaining -= delta;
        if self.is_complete() {
            // land exactly on the target to avoid accumulating float error across segments
            next = *target;
        }
        next
    }
}

/// Outcome of a rate computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    /// The target is too far away: snap to it instead of animating
    Teleport,
    Interpolate(MoveRate),
}

/// Compute the [`MoveRate`] needed to go from `source` to `target` in `duration` seconds.
///
/// `tick_delta` is the number of ticks between the two endpoints. Non-monotonic or duplicate
/// ticks are treated as malformed input and clamped to a span of 1.
pub fn compute_rate(
    source: &Pose,
    target: &Pose,
    duration: f32,
    tick_delta: i32,
    teleport_threshold: Option<f32>,
) -> Result<RateDecision> {
    if !source.is_valid() || !target.is_valid() {
        return Err(SmoothingError::InvalidPose);
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(SmoothingError::InvalidDuration(duration));
    }
    let distance = source.distance(target);
    if let Some(threshold) = teleport_threshold
        && distance >= threshold
    {
        trace!(?distance, ?threshold, "distance over teleport threshold");
        return Ok(RateDecision::Teleport);
    }
    if tick_delta < 1 {
        trace!(?tick_delta, "clamping non-monotonic tick span to 1");
    }
    Ok(RateDecision::Interpolate(MoveRate {
        position: distance / duration,
        rotation: source.angle_to(target) / duration,
        scale: source.scale_distance(target) / duration,
        tick_span: tick_delta.max(1) as u32,
        time_remaining: duration,
    }))
}
