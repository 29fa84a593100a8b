//! Smooths the rendered transform of entities whose simulation runs on a fixed tick.
//!
//! The simulation moves an anchor once per tick; rendering happens every frame. Showing the
//! anchor directly makes objects stutter whenever frames and ticks don't line up, or when
//! network corrections move the anchor. Instead, the pose of the anchor is buffered at the end of
//! every tick and a separate rendered object is moved towards the buffered poses at a rate that
//! reaches each of them exactly one tick after the previous one.
//!
//! - [`smoother::Smoother`] holds the per-entity state and can be driven by any host implementing
//!   [`host::TransformHost`]
//! - [`plugin::TickSmootherPlugin`] drives the smoothers from the Bevy fixed-update loop
//!
//! Rollback networking stacks can trigger [`plugin::PreReconcile`] and [`plugin::PostReplay`] so
//! that the buffer size follows the latency and that buffered poses get corrected.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod buffer;
pub mod config;
pub mod error;
pub mod host;
pub mod interpolation;
pub mod plugin;
pub mod rate;
pub mod smoother;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use crate::buffer::{SnapshotBuffer, TickSnapshot};
    pub use crate::config::{SmoothedProperties, SmootherConfig};
    pub use crate::error::SmoothingError;
    pub use crate::host::{MemoryHost, TransformHost};
    pub use crate::interpolation::{AdaptiveInterpolation, InterpolationSettings};
    pub use crate::plugin::{
        PostReplay, PreReconcile, SmoothingClock, Teleport, TickSmoother, TickSmootherPlugin,
        TickSmootherSystems,
    };
    pub use crate::rate::MoveRate;
    pub use crate::smoother::{Smoother, SmootherStatus};
    pub use tick_smoother_core::prelude::*;
}
