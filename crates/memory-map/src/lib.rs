//! Per-title memory maps.
//!
//! A memory map says where a particular game keeps its ball-in-play byte,
//! player scores, display message buffers and checksummed settings inside
//! shadow memory. Maps come from a catalog of JSON records, one title per
//! line, and are validated against the shadow memory size once at load.
//! Anything that fails validation is dropped, never read out of bounds.
//!
//! # Catalog record
//!
//! ```text
//! {"GameInfo":{"GameName":"Pinbot","System":"11"},
//!  "BallInPlay":{"Type":1,"Address":"0x38","Ball1":"0xF1",...},
//!  "InPlay":{"ScoreAdr":"0x200","ScoreBytes":4},...}
//! ```
//!
//! Integers may be JSON numbers or strings; strings starting `0x` are hex.

mod catalog;
mod checksum;
mod map;
mod message;
mod raw;

pub use catalog::{Catalog, ConfigFault, ConfigOutcome, load_title};
pub use checksum::{ChecksumMaintainer, ChecksumRegion, checksum16};
pub use map::{
    Adjustments, BallInPlay, BallInPlayKind, DisplayMessage, GameActiveFlag, HighScores, InPlay,
    MAX_PLAYERS, MemoryMap, MemoryWindow,
};
pub use message::{MessageError, write_message};
