//! Contains the set of shared types used by the tick smoother
#![cfg_attr(not(feature = "std"), no_std)]

pub mod clock;
pub mod pose;
pub mod tick;
pub mod wrapping_id;

#[doc(hidden)]
pub mod _internal {
    pub use paste::paste;
}

pub mod prelude {
    pub use crate::clock::NetworkClock;
    pub use crate::pose::Pose;
    pub use crate::tick::Tick;
}
