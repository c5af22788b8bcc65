//! Small fixed-capacity statistics primitives shared by the feed client and
//! the simulation providers. None of these types allocate after
//! construction which keeps them usable on hot paths.

mod buffer;
mod rolling;

pub use {
    buffer::CircularBuffer,
    rolling::{RollingAverage, SuccessRateWindow},
};
