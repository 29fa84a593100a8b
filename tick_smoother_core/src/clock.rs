//! View of the tick source consumed by the smoother
use crate::tick::Tick;
use bevy_reflect::Reflect;
use core::time::Duration;
use tracing::trace;

/// Snapshot of the local tick clock and of the current network conditions.
///
/// This is provided by the networking layer each time it calls into the smoother;
/// the smoother never advances the tick itself.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct NetworkClock {
    /// Most recent tick simulated locally
    pub local_tick: Tick,
    /// Latest round-trip-time estimate to the authoritative peer
    pub round_trip_time: Duration,
    /// Duration of one fixed simulation step
    pub tick_duration: Duration,
}

impl Default for NetworkClock {
    fn default() -> Self {
        Self {
            local_tick: Tick::UNSET,
            round_trip_time: Duration::ZERO,
            tick_duration: Duration::from_secs_f64(1.0 / 64.0),
        }
    }
}

impl NetworkClock {
    pub fn new(tick_duration: Duration) -> Self {
        Self {
            tick_duration,
            ..Default::default()
        }
    }

    pub fn with_local_tick(mut self, local_tick: Tick) -> Self {
        self.local_tick = local_tick;
        self
    }

    pub fn with_round_trip_time(mut self, round_trip_time: Duration) -> Self {
        self.round_trip_time = round_trip_time;
        self
    }

    pub fn tick_secs(&self) -> f32 {
        self.tick_duration.as_secs_f32()
    }

    /// Round-trip time expressed as a (fractional) number of ticks
    pub fn round_trip_ticks(&self) -> f32 {
        let tick_secs = self.tick_secs();
        if tick_secs <= 0.0 {
            trace!(
                tick_duration = ?self.tick_duration,
                "tick duration is zero, ignoring the round-trip time"
            );
            return 0.0;
        }
        self.round_trip_time.as_secs_f32() / tick_secs
    }
}
