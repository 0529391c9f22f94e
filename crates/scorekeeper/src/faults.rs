//! Fault indicators.
//!
//! Faults are reported, never fatal. Bus faults mean shadow memory can't be
//! trusted, so the scheduler stops writing it back until they clear.

use pinball_core::{Millis, Observable, Value};
use shadow_memory::ShadowMemory;

bitflags::bitflags! {
    /// Active fault indicators.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Faults: u8 {
        /// No capture writes seen within the watch window after boot.
        const NO_BUS_ACTIVITY = 0b0000_0001;
        /// Capture writes arrived before capture was armed.
        const EARLY_BUS_ACTIVITY = 0b0000_0010;
        /// Title configuration fell back to the safe default.
        const CONFIG_DEGRADED = 0b0000_0100;
        /// Last FRAM transfer failed.
        const STORAGE = 0b0000_1000;

        /// Faults that withhold writeback.
        const BUS = Self::NO_BUS_ACTIVITY.bits() | Self::EARLY_BUS_ACTIVITY.bits();
    }
}

/// Watches capture activity on shadow memory.
///
/// A running CPU writes its RAM constantly. Silence for the whole watch
/// window means the capture hardware isn't seeing the bus. Writes counted
/// before [`arm`](Self::arm) mean something wrote while the boot image was
/// still being restored, so the image may be mixed.
#[derive(Debug, Clone)]
pub struct BusMonitor {
    window_ms: u64,
    armed_at: Option<Millis>,
    /// Capture write count at the last check.
    last_total: u64,
    seen: bool,
    faults: Faults,
}

impl BusMonitor {
    #[must_use]
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            armed_at: None,
            last_total: 0,
            seen: false,
            faults: Faults::empty(),
        }
    }

    /// Start watching. Call once the boot image is in shadow memory.
    pub fn arm(&mut self, shadow: &ShadowMemory, now: Millis) {
        let early = shadow.total_activity();
        if early > 0 {
            log::warn!("{early} capture writes before capture was armed");
            self.faults |= Faults::EARLY_BUS_ACTIVITY;
        }
        self.last_total = early;
        self.armed_at = Some(now);
    }

    /// Update the bus faults; returns the current set.
    pub fn check(&mut self, shadow: &ShadowMemory, now: Millis) -> Faults {
        let Some(armed_at) = self.armed_at else {
            return self.faults;
        };
        let total = shadow.total_activity();
        if total != self.last_total {
            self.last_total = total;
            if !self.seen {
                log::info!("bus activity seen after {} ms", now.since(armed_at));
            }
            self.seen = true;
            if self.faults.contains(Faults::NO_BUS_ACTIVITY) {
                log::info!("bus activity resumed");
                self.faults.remove(Faults::NO_BUS_ACTIVITY);
            }
        } else if !self.seen
            && now.since(armed_at) >= self.window_ms
            && !self.faults.contains(Faults::NO_BUS_ACTIVITY)
        {
            log::warn!("no bus activity within {} ms of boot", self.window_ms);
            self.faults |= Faults::NO_BUS_ACTIVITY;
        }
        self.faults
    }

    #[must_use]
    pub const fn faults(&self) -> Faults {
        self.faults
    }

    /// Has any capture write been seen since arming?
    #[must_use]
    pub const fn seen(&self) -> bool {
        self.seen
    }
}

impl Observable for Faults {
    fn query(&self, path: &str) -> Option<Value> {
        let flag = match path {
            "bits" => return Some(self.bits().into()),
            "no_bus_activity" => Faults::NO_BUS_ACTIVITY,
            "early_bus_activity" => Faults::EARLY_BUS_ACTIVITY,
            "config_degraded" => Faults::CONFIG_DEGRADED,
            "storage" => Faults::STORAGE,
            _ => return None,
        };
        Some(self.contains(flag).into())
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "bits",
            "no_bus_activity",
            "early_bus_activity",
            "config_degraded",
            "storage",
        ]
    }
}
