//! Debounce for electromechanical machines.
//!
//! EM machines have no CPU bus to snoop. Instead up to 32 switch and relay
//! contacts are sampled on a fixed period, one bit per channel, and this
//! crate turns that raw sample stream into score and reset events.
//!
//! # Event contract
//!
//! | Mask         | Bit `i` set means                                      |
//! |--------------|--------------------------------------------------------|
//! | `score_hits` | channel `i` held active for its score stage; armed     |
//! | `reset_hits` | armed channel `i` held idle for its reset stage; disarmed |
//!
//! The sampling callback owns the [`DebounceFilter`] and an [`EventSender`];
//! the game-state poll drains the matching [`EventReceiver`], one event set
//! per sample.

mod filter;
mod queue;

pub use filter::{
    CHANNELS, DEFAULT_RESET_STAGE, DEFAULT_SCORE_STAGE, DEPTH, DebounceEvents, DebounceFilter,
    Polarity, StageError,
};
pub use queue::{EVENT_QUEUE_DEPTH, EventReceiver, EventSender, event_queue};
