//! Runtime configuration.

use game_state::EmConfig;
use pinball_core::Family;
use sensor_debounce::Polarity;

/// Configuration for constructing a [`Scorekeeper`](crate::Scorekeeper).
#[derive(Debug, Clone)]
pub struct ScorekeeperConfig {
    /// Board the firmware runs on.
    pub family: Family,
    /// Catalog title to load (`GameInfo.GameName`).
    pub title: String,
    /// Game-state poll period (ms).
    pub poll_interval_ms: u64,
    /// Shadow memory writeback period (ms).
    pub writeback_interval_ms: u64,
    /// Sensor sampling period (ms, EM only).
    pub sample_interval_ms: u64,
    /// How long after boot the bus must show activity (ms).
    pub bus_watch_window_ms: u64,
    /// Sensor input sense (EM only).
    pub polarity: Polarity,
    /// Switch wiring (EM only).
    pub em: EmConfig,
}

impl ScorekeeperConfig {
    /// Defaults for `title` on a `family` board.
    #[must_use]
    pub fn new(family: Family, title: impl Into<String>) -> Self {
        Self {
            family,
            title: title.into(),
            poll_interval_ms: 100,
            writeback_interval_ms: 100,
            sample_interval_ms: 1,
            bus_watch_window_ms: 5_000,
            polarity: Polarity::default(),
            em: EmConfig::default(),
        }
    }
}

impl Default for ScorekeeperConfig {
    fn default() -> Self {
        Self::new(Family::Sys11, "GenericSystem")
    }
}
