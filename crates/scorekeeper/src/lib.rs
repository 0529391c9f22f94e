//! Pinball scorekeeper core.
//!
//! Ties the hardware-facing crates together for one machine: loads the
//! title's memory map, restores shadow memory from FRAM at boot, then on
//! each scheduler tick polls game state and writes changed shadow memory
//! back.
//!
//! ```text
//!  capture ──► ShadowMemory ──► GameStateEngine ──► GameReport
//!                  │  ▲
//!        writeback ▼  │ restore
//!                  FRAM ◄── NvLog, DataStore, AdjustmentProfiles
//! ```
//!
//! EM boards have no shadow memory; their sensors feed a [`Sampler`]
//! instead.

mod config;
mod faults;
pub mod nv;
mod scorekeeper;

pub use config::ScorekeeperConfig;
pub use faults::{BusMonitor, Faults};
pub use scorekeeper::{LAST_GAME_RECORD, MachineSource, Sampler, Scorekeeper};
