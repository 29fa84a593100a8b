//! Sizing of the playback buffer.
//!
//! The number of ticks buffered before playback (`current_ticks`) either comes straight from the
//! config, or is derived from the observed latency when adaptive interpolation is enabled.
use bevy_math::ops;
use bevy_reflect::Reflect;
use serde::{Deserialize, Serialize};
use tick_smoother_core::clock::NetworkClock;
use tick_smoother_core::tick::Tick;
use tracing::trace;

/// Lower bound of `current_ticks` when it is computed adaptively
pub const MIN_ADAPTIVE_TICKS: u8 = 2;

/// How aggressively the interpolation buffer tracks the observed latency
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum AdaptiveInterpolation {
    /// Use the configured number of ticks
    Off,
    VeryLow,
    Low,
    #[default]
    Moderate,
    High,
    VeryHigh,
}

impl AdaptiveInterpolation {
    /// Scalar applied to the measured delay (in ticks). These are tuning defaults.
    pub fn multiplier(&self) -> Option<f32> {
        match self {
            AdaptiveInterpolation::Off => None,
            AdaptiveInterpolation::VeryLow => Some(0.45),
            AdaptiveInterpolation::Low => Some(0.8),
            AdaptiveInterpolation::Moderate => Some(1.05),
            AdaptiveInterpolation::High => Some(1.25),
            AdaptiveInterpolation::VeryHigh => Some(1.5),
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self != AdaptiveInterpolation::Off
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Reflect)]
#[serde(default)]
pub struct InterpolationSettings {
    /// Ticks buffered for entities controlled by the local peer (or by the server)
    pub owner_ticks: u8,
    /// Ticks buffered for other entities when adaptive interpolation is off
    pub spectator_ticks: u8,
    pub adaptive: AdaptiveInterpolation,
    /// Derived buffer target, recomputed on initialization and on every reconciliation
    #[serde(skip)]
    current_ticks: u8,
}

impl Default for InterpolationSettings {
    fn default() -> Self {
        Self {
            owner_ticks: 1,
            spectator_ticks: 2,
            adaptive: AdaptiveInterpolation::default(),
            current_ticks: 2,
        }
    }
}

impl InterpolationSettings {
    pub fn new(owner_ticks: u8, spectator_ticks: u8, adaptive: AdaptiveInterpolation) -> Self {
        Self {
            owner_ticks,
            spectator_ticks,
            adaptive,
            current_ticks: spectator_ticks,
        }
    }

    pub fn current_ticks(&self) -> u8 {
        self.current_ticks
    }

    /// Override the current target until the next recomputation
    pub(crate) fn set_current_ticks(&mut self, ticks: u8) {
        self.current_ticks = ticks;
    }

    /// Adaptive sizing only applies to entities that experience network latency,
    /// i.e. not to the owner (or the server)
    pub fn uses_adaptive(&self, is_owner: bool) -> bool {
        !is_owner && self.adaptive.is_enabled()
    }

    /// Recompute `current_ticks`.
    ///
    /// `client_state_tick` is the authoritative tick the client last had state for;
    /// [`Tick::UNSET`] means it is unknown and the delay is approximated from the round-trip time.
    pub fn recompute(
        &mut self,
        is_owner: bool,
        clock: &NetworkClock,
        client_state_tick: Tick,
    ) -> u8 {
        if is_owner {
            self.current_ticks = self.owner_ticks;
            return self.current_ticks;
        }
        let Some(multiplier) = self.adaptive.multiplier() else {
            self.current_ticks = self.spectator_ticks;
            return self.current_ticks;
        };
        let raw_delay = if client_state_tick.is_unset() || clock.local_tick.is_unset() {
            clock.round_trip_ticks()
        } else {
            (clock.local_tick - client_state_tick) as f32
        };
        let ticks = ops::round(raw_delay * multiplier);
        self.current_ticks = if ticks.is_finite() {
            ticks.clamp(MIN_ADAPTIVE_TICKS as f32, u8::MAX as f32) as u8
        } else {
            MIN_ADAPTIVE_TICKS
        };
        trace!(
            ?raw_delay,
            ?multiplier,
            current_ticks = self.current_ticks,
            "recomputed adaptive interpolation"
        );
        self.current_ticks
    }
}
