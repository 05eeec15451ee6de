//! Playback of a normalized route: which drive point is "current", with
//! automatic dwell pauses at stops.

mod driver;
mod scheduler;

pub use driver::PlaybackDriver;
pub use scheduler::{PlaybackConfig, PlaybackScheduler, MAX_SPEED, MIN_SPEED};
pub use trip_core::{PlaybackEvent, PlaybackState};
