//! Game-state detection.
//!
//! A [`GameStateEngine`] turns a ball-in-play reading into game start and
//! end events. Where the reading comes from depends on the hardware:
//!
//! | Family          | Source                                  | Hold time |
//! |-----------------|-----------------------------------------|-----------|
//! | System 9 / 11   | [`ShadowSource`]: ball-in-play byte     | none      |
//! | WPC, Data East  | [`ShadowSource`]: byte + game-active flag | 15 s    |
//! | EM              | [`EmSource`]: debounced switch events   | none      |
//!
//! The engine never fails. Readings that make no sense (a byte caught
//! mid-write, a BCD nibble above 9) are clamped or held over to the next
//! poll.

#![allow(clippy::cast_precision_loss)]

mod bcd;
mod em;
mod engine;
mod report;
mod source;

pub use bcd::decode_bcd;
pub use em::{EmConfig, EmSource, EmTracker};
pub use engine::{GameStateEngine, GameStatus, PollState};
pub use report::GameReport;
pub use source::{BallInPlaySource, ShadowSource};
