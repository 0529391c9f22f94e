//! Ball and score tracking for electromechanical machines.
//!
//! An EM machine has no memory to read, so the tracker follows the game
//! from debounced switch events: the start relay begins a game, every
//! outhole drain advances the ball, and scoring switches add their value.

use pinball_core::Millis;
use sensor_debounce::{CHANNELS, DebounceEvents, EventReceiver};

use crate::source::BallInPlaySource;

/// Wiring of one EM machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmConfig {
    /// Channel on the game start (coin/credit) relay.
    pub start_channel: usize,
    /// Channel on the outhole switch.
    pub outhole_channel: usize,
    /// Balls per game (usually 3 or 5).
    pub balls_per_game: u8,
    /// Points per score event, per channel. Zero for non-scoring channels.
    pub score_values: [u32; CHANNELS],
}

impl Default for EmConfig {
    fn default() -> Self {
        let mut score_values = [0; CHANNELS];
        // 10s, 100s and 1000s relays on channels 0-2.
        score_values[0] = 10;
        score_values[1] = 100;
        score_values[2] = 1000;
        Self {
            start_channel: 30,
            outhole_channel: 31,
            balls_per_game: 5,
            score_values,
        }
    }
}

/// Ball and score state derived from debounce events.
#[derive(Debug, Clone)]
pub struct EmTracker {
    config: EmConfig,
    /// 0 when no game is running.
    ball: u8,
    score: u64,
}

impl EmTracker {
    #[must_use]
    pub fn new(config: EmConfig) -> Self {
        Self {
            config,
            ball: 0,
            score: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EmConfig {
        &self.config
    }

    #[must_use]
    pub const fn ball(&self) -> u8 {
        self.ball
    }

    #[must_use]
    pub const fn score(&self) -> u64 {
        self.score
    }

    /// Apply one batch of events.
    pub fn apply(&mut self, events: DebounceEvents) {
        let hits = events.score_hits;
        let fired = |channel: usize| channel < CHANNELS && hits & (1 << channel) != 0;

        if fired(self.config.start_channel) {
            // Pressing start mid-game restarts it on these machines.
            self.ball = 1;
            self.score = 0;
            log::debug!("EM start relay: ball 1");
        }
        if self.ball == 0 {
            return;
        }

        for (channel, &value) in self.config.score_values.iter().enumerate() {
            if value != 0 && fired(channel) {
                self.score = self.score.saturating_add(u64::from(value));
            }
        }

        if fired(self.config.outhole_channel) {
            if self.ball >= self.config.balls_per_game {
                log::debug!("EM outhole on last ball: game over at {}", self.score);
                self.ball = 0;
            } else {
                self.ball += 1;
            }
        }
    }
}

/// [`BallInPlaySource`] fed by the debounce event queue.
pub struct EmSource {
    events: EventReceiver,
    tracker: EmTracker,
}

impl EmSource {
    #[must_use]
    pub fn new(events: EventReceiver, config: EmConfig) -> Self {
        Self {
            events,
            tracker: EmTracker::new(config),
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &EmTracker {
        &self.tracker
    }
}

impl BallInPlaySource for EmSource {
    fn ball_in_play(&self) -> Option<u8> {
        Some(self.tracker.ball())
    }

    fn score(&self, player: usize) -> Option<u64> {
        (player == 0).then_some(self.tracker.score())
    }

    fn player_up(&self) -> Option<u8> {
        Some(1)
    }

    fn refresh(&mut self, _now: Millis) {
        for events in self.events.drain() {
            self.tracker.apply(events);
        }
    }
}
