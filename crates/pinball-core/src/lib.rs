//! Core traits and types shared by the pinball scorekeeper crates.
//!
//! Everything runs off one monotonic millisecond clock supplied by the
//! scheduler. No component reads wall time on its own.

mod family;
mod interval;
mod millis;
mod observable;
mod periodic;

pub use family::{Family, UnknownFamily};
pub use interval::Interval;
pub use millis::Millis;
pub use observable::{Observable, Value};
pub use periodic::Periodic;
