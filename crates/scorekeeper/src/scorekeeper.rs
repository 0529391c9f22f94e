//! Boot sequence and periodic scheduling.
//!
//! ```text
//! boot:  resolve title ─► validate NV layout ─► restore shadow image
//!        ─► open NV log ─► arm bus monitor ─► build engine
//! tick:  [poll slot]      engine poll, bus check, game start/end records
//!        [writeback slot] incremental FRAM writeback unless a bus fault
//! ```
//!
//! Nothing here is fatal after boot. Storage failures are logged, flagged
//! in [`Faults`] and retried on the next period.

use std::sync::Arc;

use game_state::{BallInPlaySource, EmSource, GameReport, GameStateEngine, PollState, ShadowSource};
use memory_map::{Catalog, ChecksumMaintainer, ConfigFault, MemoryMap, MessageError};
use pinball_core::{Interval, Millis, Observable, Periodic, Value};
use sensor_debounce::{DebounceEvents, DebounceFilter, EVENT_QUEUE_DEPTH, EventSender, event_queue};
use shadow_memory::ShadowMemory;
use spi_fram::{Fram, FramError, SpiDevice, Writeback};

use crate::config::ScorekeeperConfig;
use crate::faults::{BusMonitor, Faults};
use crate::nv::{AdjustmentProfiles, DataStore, LayoutError, NvLayout, NvLog, StoreError};

/// Data store record holding the last finished game.
pub const LAST_GAME_RECORD: &str = "last_game";

/// Ball-in-play source for whichever family the board is.
pub enum MachineSource {
    Shadow(ShadowSource),
    Em(EmSource),
}

impl BallInPlaySource for MachineSource {
    fn ball_in_play(&self) -> Option<u8> {
        match self {
            Self::Shadow(source) => source.ball_in_play(),
            Self::Em(source) => source.ball_in_play(),
        }
    }

    fn game_active_flag(&self) -> Option<bool> {
        match self {
            Self::Shadow(source) => source.game_active_flag(),
            Self::Em(source) => source.game_active_flag(),
        }
    }

    fn score(&self, player: usize) -> Option<u64> {
        match self {
            Self::Shadow(source) => source.score(player),
            Self::Em(source) => source.score(player),
        }
    }

    fn player_up(&self) -> Option<u8> {
        match self {
            Self::Shadow(source) => source.player_up(),
            Self::Em(source) => source.player_up(),
        }
    }

    fn refresh(&mut self, now: Millis) {
        match self {
            Self::Shadow(source) => source.refresh(now),
            Self::Em(source) => source.refresh(now),
        }
    }
}

/// Sampling side of an EM board.
///
/// Owned by the sampling callback. It shares nothing with the poll side
/// except the event queue.
pub struct Sampler {
    filter: DebounceFilter,
    events: EventSender,
}

impl Sampler {
    /// Debounce one raw sample and queue its events.
    pub fn sample(&mut self, raw: u32) -> DebounceEvents {
        let events = self.filter.process(raw);
        self.events.publish(events);
        events
    }

    /// Event sets folded together because the poll fell behind.
    #[must_use]
    pub fn merged(&self) -> u64 {
        self.events.merged()
    }

    #[must_use]
    pub fn filter(&self) -> &DebounceFilter {
        &self.filter
    }

    /// Stage configuration.
    pub fn filter_mut(&mut self) -> &mut DebounceFilter {
        &mut self.filter
    }
}

/// The scorekeeper core for one machine.
pub struct Scorekeeper<D: SpiDevice> {
    config: ScorekeeperConfig,
    map: MemoryMap,
    config_fault: Option<ConfigFault>,
    shadow: Arc<ShadowMemory>,
    checksums: ChecksumMaintainer,

    fram: Fram<D>,
    layout: NvLayout,
    writeback: Writeback,
    log: Option<NvLog>,
    store: DataStore,
    profiles: AdjustmentProfiles,

    engine: GameStateEngine<MachineSource>,
    sampler: Option<Sampler>,

    bus: BusMonitor,
    faults: Faults,

    poll_slot: Interval,
    writeback_slot: Interval,
    sample_slot: Interval,
}

impl<D: SpiDevice> Scorekeeper<D> {
    /// Bring the core up.
    ///
    /// Must run before the capture mechanism starts writing shadow memory:
    /// the persisted image is restored into it here. Only an impossible NV
    /// layout fails; everything else degrades and is reported in
    /// [`faults`](Self::faults).
    pub fn boot(
        config: ScorekeeperConfig,
        catalog: &Catalog,
        mut fram: Fram<D>,
        shadow: Arc<ShadowMemory>,
        now: Millis,
    ) -> Result<Self, LayoutError> {
        let family = config.family;
        let mut faults = Faults::empty();

        let (map, config_fault) = catalog
            .resolve(&config.title, family, shadow.len())
            .into_parts();
        if config_fault.is_some() {
            faults |= Faults::CONFIG_DEGRADED;
        }

        let layout = NvLayout::standard(shadow.len(), fram.size())?;
        let store = DataStore::standard(layout.data_store)?;
        let profiles = AdjustmentProfiles::new(layout.adjustments)?;

        let mut writeback = Writeback::new();
        if !shadow.is_empty() {
            match fram.restore_all(&shadow) {
                Ok(()) => writeback.mark_restored(&shadow),
                Err(e) => {
                    log::warn!("shadow image restore failed: {e}");
                    faults |= Faults::STORAGE;
                }
            }
        }

        let log = match NvLog::open(&mut fram, layout.logger) {
            Ok(log) => Some(log),
            Err(e) => {
                log::warn!("NV log unavailable: {e}");
                faults |= Faults::STORAGE;
                None
            }
        };

        let mut bus = BusMonitor::new(config.bus_watch_window_ms);
        let (source, sampler) = if family.has_bus() {
            bus.arm(&shadow, now);
            faults |= bus.faults();
            (
                MachineSource::Shadow(ShadowSource::new(Arc::clone(&shadow), &map)),
                None,
            )
        } else {
            let (sender, receiver) = event_queue(EVENT_QUEUE_DEPTH);
            let sampler = Sampler {
                filter: DebounceFilter::new(config.polarity),
                events: sender,
            };
            (
                MachineSource::Em(EmSource::new(receiver, config.em.clone())),
                Some(sampler),
            )
        };

        let mut keeper = Self {
            checksums: map.checksum_maintainer(),
            engine: GameStateEngine::new(source, family),
            poll_slot: Interval::new(config.poll_interval_ms, now),
            writeback_slot: Interval::new(config.writeback_interval_ms, now),
            sample_slot: Interval::new(config.sample_interval_ms, now),
            config,
            map,
            config_fault,
            shadow,
            fram,
            layout,
            writeback,
            log,
            store,
            profiles,
            sampler,
            bus,
            faults,
        };

        let boot_line = format!("boot {} ({family})", keeper.map.game_name);
        keeper.log_event(now, &boot_line);
        if let Some(fault) = &keeper.config_fault {
            let line = format!("config degraded: {fault}");
            keeper.log_event(now, &line);
        }
        log::info!(
            "scorekeeper up: {} on {family}, faults {:?}",
            keeper.map.game_name,
            keeper.faults
        );
        Ok(keeper)
    }

    /// Run whichever periodic slots are due at `now`.
    ///
    /// Returns the engine state if the poll slot ran.
    pub fn tick(&mut self, now: Millis) -> Option<PollState> {
        let state = self.poll_slot.due(now).then(|| self.poll_game(now));
        if self.writeback_slot.due(now) {
            self.write_back();
        }
        state
    }

    fn poll_game(&mut self, now: Millis) -> PollState {
        let started = self.engine.games_started();
        let state = self.engine.poll(now);

        if self.config.family.has_bus() {
            let bus = self.bus.check(&self.shadow, now);
            self.faults = self.faults.difference(Faults::BUS) | bus;
        }

        if self.engine.games_started() != started {
            let line = format!("game start, ball {}", self.engine.ball_in_play());
            self.log_event(now, &line);
        }
        if state == PollState::JustEnded {
            self.record_game(now);
        }
        state
    }

    fn record_game(&mut self, now: Millis) {
        let report = self.engine.report(now);
        if let Err(e) = self.store.write_json(&mut self.fram, LAST_GAME_RECORD, &report) {
            log::warn!("could not store finished game: {e}");
            self.faults |= Faults::STORAGE;
        }
        let line = format!(
            "game over, {:.1} s, scores {:?}",
            report.game_time, report.scores
        );
        self.log_event(now, &line);
    }

    fn write_back(&mut self) {
        if self.shadow.is_empty() {
            return;
        }
        if self.faults.intersects(Faults::BUS) {
            log::debug!("writeback withheld: {:?}", self.faults & Faults::BUS);
            return;
        }
        match self.writeback.sync(&mut self.fram, &self.shadow) {
            Ok(_) => self.faults.remove(Faults::STORAGE),
            Err(e) => {
                log::warn!("writeback failed, retrying next period: {e}");
                self.faults |= Faults::STORAGE;
            }
        }
    }

    /// Append a line to the NV log. Failures only set the storage fault.
    pub fn log_event(&mut self, now: Millis, text: &str) {
        let Some(log) = &mut self.log else {
            return;
        };
        if let Err(e) = log.append(&mut self.fram, &format!("{:>10} {text}", now.get())) {
            log::warn!("NV log append failed: {e}");
            self.faults |= Faults::STORAGE;
        }
    }

    /// NV log entries, oldest first.
    pub fn log_lines(&mut self) -> Result<Vec<String>, FramError> {
        match &self.log {
            Some(log) => log.lines(&mut self.fram),
            None => Ok(Vec::new()),
        }
    }

    /// Is the sampling slot due? For hosts that drive sampling from the
    /// same loop as [`tick`](Self::tick).
    pub fn sample_due(&mut self, now: Millis) -> bool {
        self.sampler.is_some() && self.sample_slot.due(now)
    }

    /// Feed one raw sensor sample (EM boards). Other boards ignore it.
    pub fn sample(&mut self, raw: u32) -> DebounceEvents {
        self.sampler
            .as_mut()
            .map_or_else(DebounceEvents::default, |sampler| sampler.sample(raw))
    }

    /// Hand the sampling side to its own callback. After this,
    /// [`sample`](Self::sample) does nothing.
    pub fn take_sampler(&mut self) -> Option<Sampler> {
        self.sampler.take()
    }

    /// Replace the display message and fix its checksum.
    pub fn write_message(&self, lines: &[&str]) -> Result<(), MessageError> {
        let message = self
            .map
            .display_message
            .as_ref()
            .ok_or(MessageError::Unsupported)?;
        memory_map::write_message(&self.shadow, message, &self.checksums, lines)
    }

    /// Snapshot the game's adjustments into profile `slot`.
    pub fn save_profile(&mut self, slot: usize, name: &str) -> Result<(), StoreError> {
        self.profiles
            .save(&mut self.fram, slot, name, &self.shadow, &self.map)
    }

    /// Put profile `slot` back into the game.
    pub fn restore_profile(&mut self, slot: usize) -> Result<(), StoreError> {
        self.profiles
            .restore(&mut self.fram, slot, &self.shadow, &self.map)
    }

    pub fn profile_names(&mut self) -> Result<Vec<Option<String>>, StoreError> {
        self.profiles.names(&mut self.fram)
    }

    /// Store a named record.
    pub fn write_record(&mut self, name: &str, payload: &[u8]) -> Result<(), StoreError> {
        self.store.write(&mut self.fram, name, payload)?;
        Ok(())
    }

    /// Load a named record.
    pub fn read_record(&mut self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.store.read(&mut self.fram, name)
    }

    /// Last finished game, if one was stored.
    pub fn last_game(&mut self) -> Result<serde_json::Value, StoreError> {
        self.store.read_json(&mut self.fram, LAST_GAME_RECORD)
    }

    #[must_use]
    pub fn report(&self, now: Millis) -> GameReport {
        self.engine.report(now)
    }

    #[must_use]
    pub const fn faults(&self) -> Faults {
        self.faults
    }

    #[must_use]
    pub fn engine(&self) -> &GameStateEngine<MachineSource> {
        &self.engine
    }

    #[must_use]
    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    /// Why the title fell back to the safe default, if it did.
    #[must_use]
    pub fn config_fault(&self) -> Option<&ConfigFault> {
        self.config_fault.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &ScorekeeperConfig {
        &self.config
    }

    #[must_use]
    pub fn shadow(&self) -> &Arc<ShadowMemory> {
        &self.shadow
    }

    #[must_use]
    pub const fn layout(&self) -> &NvLayout {
        &self.layout
    }

    #[must_use]
    pub fn writeback(&self) -> &Writeback {
        &self.writeback
    }

    #[must_use]
    pub fn fram(&self) -> &Fram<D> {
        &self.fram
    }

    pub fn fram_mut(&mut self) -> &mut Fram<D> {
        &mut self.fram
    }
}

impl<D: SpiDevice> Periodic for Scorekeeper<D> {
    fn poll(&mut self, now: Millis) {
        self.tick(now);
    }
}

impl<D: SpiDevice> Observable for Scorekeeper<D> {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("engine.") {
            self.engine.query(rest)
        } else if let Some(rest) = path.strip_prefix("shadow.") {
            self.shadow.query(rest)
        } else if let Some(rest) = path.strip_prefix("writeback.") {
            self.writeback.query(rest)
        } else if let Some(rest) = path.strip_prefix("faults.") {
            self.faults.query(rest)
        } else if let Some(rest) = path.strip_prefix("debounce.") {
            self.sampler.as_ref()?.filter.query(rest)
        } else {
            match path {
                "title" => Some(self.map.game_name.as_str().into()),
                "family" => Some(self.config.family.name().into()),
                "degraded" => Some(self.config_fault.is_some().into()),
                "log.head" => Some(self.log.as_ref().map(NvLog::head).into()),
                "log.wrapped" => Some(self.log.as_ref().map(NvLog::wrapped).into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "title",
            "family",
            "degraded",
            "log.head",
            "log.wrapped",
            "engine.<path>",
            "shadow.<path>",
            "writeback.<path>",
            "faults.<path>",
            "debounce.<path>",
        ]
    }
}
