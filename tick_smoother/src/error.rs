//! Smoothing-related errors
//!
//! None of these are fatal: the [`Smoother`](crate::smoother::Smoother) logs them and
//! continues from its last good state.

use tick_smoother_core::tick::Tick;

pub type Result<T> = core::result::Result<T, SmoothingError>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum SmoothingError {
    #[error("pose is invalid or contains non-finite values")]
    InvalidPose,
    #[error("segment duration must be finite and strictly positive, got {0}")]
    InvalidDuration(f32),
    #[error("tick {tick:?} is older than the most recent buffered tick {last:?}")]
    StaleTick { tick: Tick, last: Tick },
    #[error("the smoother is not attached")]
    NotAttached,
}
