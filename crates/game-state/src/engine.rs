//! Game start/end state machine.
//!
//! ```text
//!        ball != 0              ball == 0 (held)
//!  Idle ───────────► Running ───────────────► JustEnded
//!   ▲                                            │
//!   └────────────── next poll ───────────────────┘
//! ```
//!
//! `JustEnded` lasts exactly one poll so consumers see each game end once.
//! The poll that leaves it evaluates the `Idle` rule straight away, so a
//! ball already in play starts the next game without a dead poll.

use memory_map::MAX_PLAYERS;
use pinball_core::{Family, Millis, Observable, Value};

use crate::report::GameReport;
use crate::source::BallInPlaySource;

/// Invalid readings in a row that count as "no ball".
const INVALID_READS_AS_ZERO: u8 = 2;

/// Phase of the state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PollState {
    #[default]
    Idle = 0,
    Running = 1,
    JustEnded = 2,
}

/// Derived game state. Only [`GameStateEngine::poll`] changes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameStatus {
    pub poll_state: PollState,
    pub game_active: bool,
    pub ball_in_play: u8,
    pub time_game_start: Option<Millis>,
    pub time_game_end: Option<Millis>,
    /// When ball-in-play first read zero during the current hold.
    pub end_hold_start: Option<Millis>,
}

/// Game-state engine over one ball-in-play source.
pub struct GameStateEngine<S: BallInPlaySource> {
    source: S,
    family: Family,
    hold_ms: u64,
    status: GameStatus,
    invalid_reads: u8,
    games_started: u64,
}

impl<S: BallInPlaySource> GameStateEngine<S> {
    /// Engine using the family's hold time.
    #[must_use]
    pub fn new(source: S, family: Family) -> Self {
        Self::with_hold_time(source, family, family.hold_time_ms())
    }

    /// Engine with an explicit hold time (0 disables the hold).
    #[must_use]
    pub fn with_hold_time(source: S, family: Family, hold_ms: u64) -> Self {
        Self {
            source,
            family,
            hold_ms,
            status: GameStatus::default(),
            invalid_reads: 0,
            games_started: 0,
        }
    }

    #[must_use]
    pub const fn family(&self) -> Family {
        self.family
    }

    #[must_use]
    pub const fn hold_time_ms(&self) -> u64 {
        self.hold_ms
    }

    #[must_use]
    pub const fn status(&self) -> &GameStatus {
        &self.status
    }

    #[must_use]
    pub const fn poll_state(&self) -> PollState {
        self.status.poll_state
    }

    #[must_use]
    pub const fn game_active(&self) -> bool {
        self.status.game_active
    }

    #[must_use]
    pub const fn ball_in_play(&self) -> u8 {
        self.status.ball_in_play
    }

    /// Games started since construction.
    #[must_use]
    pub const fn games_started(&self) -> u64 {
        self.games_started
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Take one reading and advance the state machine.
    pub fn poll(&mut self, now: Millis) -> PollState {
        self.source.refresh(now);
        let ball = self.read_ball();
        self.status.ball_in_play = ball;

        if self.status.poll_state == PollState::JustEnded {
            self.status.poll_state = PollState::Idle;
        }

        match self.status.poll_state {
            PollState::Idle => {
                if ball != 0 {
                    self.start_game(now);
                }
            }
            PollState::Running => {
                if ball != 0 {
                    if self.status.end_hold_start.take().is_some() {
                        log::debug!("ball {ball} back in play, end hold cancelled");
                    }
                } else if self.hold_expired(now) {
                    self.end_game(now);
                }
            }
            PollState::JustEnded => {}
        }
        self.status.poll_state
    }

    /// Ball reading with torn reads smoothed over.
    fn read_ball(&mut self) -> u8 {
        match self.source.ball_in_play() {
            Some(ball) => {
                self.invalid_reads = 0;
                ball
            }
            None => {
                self.invalid_reads = self.invalid_reads.saturating_add(1);
                if self.invalid_reads >= INVALID_READS_AS_ZERO {
                    0
                } else {
                    self.status.ball_in_play
                }
            }
        }
    }

    /// Has ball-in-play read zero long enough to call the game over?
    fn hold_expired(&mut self, now: Millis) -> bool {
        if self.hold_ms == 0 {
            return true;
        }
        let started = *self.status.end_hold_start.get_or_insert(now);
        if self.source.game_active_flag() == Some(true) {
            return false;
        }
        now.since(started) >= self.hold_ms
    }

    fn start_game(&mut self, now: Millis) {
        self.status.poll_state = PollState::Running;
        self.status.game_active = true;
        self.status.time_game_start = Some(now);
        self.status.time_game_end = None;
        self.status.end_hold_start = None;
        self.games_started += 1;
        log::info!("game started ({}, ball {})", self.family, self.status.ball_in_play);
    }

    fn end_game(&mut self, now: Millis) {
        self.status.poll_state = PollState::JustEnded;
        self.status.game_active = false;
        self.status.time_game_end = Some(now);
        self.status.end_hold_start = None;
        log::info!("game ended after {:.1} s", self.game_time(now));
    }

    /// Score of `player` (0-based); 0 if the source has none.
    #[must_use]
    pub fn read_score(&self, player: usize) -> u64 {
        self.source.score(player).unwrap_or(0)
    }

    #[must_use]
    pub fn player_up(&self) -> Option<u8> {
        self.source.player_up()
    }

    /// Length of the current (or last) game in seconds.
    #[must_use]
    pub fn game_time(&self, now: Millis) -> f64 {
        match (self.status.time_game_start, self.status.time_game_end) {
            (Some(start), Some(end)) => Millis(end - start).as_secs_f64(),
            (Some(start), None) => Millis(now.since(start)).as_secs_f64(),
            _ => 0.0,
        }
    }

    /// Snapshot for the network layer.
    #[must_use]
    pub fn report(&self, now: Millis) -> GameReport {
        GameReport {
            ball_in_play: self.status.ball_in_play,
            scores: std::array::from_fn(|player| self.read_score(player)),
            game_active: self.status.game_active,
            game_time: self.game_time(now),
            player_up: self.player_up(),
        }
    }
}

impl<S: BallInPlaySource> Observable for GameStateEngine<S> {
    fn query(&self, path: &str) -> Option<Value> {
        let millis = |t: Option<Millis>| Value::from(t.map(Millis::get));
        match path {
            "poll_state" => Some(Value::U8(self.status.poll_state as u8)),
            "game_active" => Some(self.status.game_active.into()),
            "ball_in_play" => Some(self.status.ball_in_play.into()),
            "time_game_start" => Some(millis(self.status.time_game_start)),
            "time_game_end" => Some(millis(self.status.time_game_end)),
            "end_hold_start" => Some(millis(self.status.end_hold_start)),
            "games_started" => Some(self.games_started.into()),
            "family" => Some(self.family.name().into()),
            "player_up" => Some(self.player_up().into()),
            "scores" => Some(Value::Array(
                (0..MAX_PLAYERS)
                    .map(|player| Value::U64(self.read_score(player)))
                    .collect(),
            )),
            "last_game_time" => Some(
                self.status
                    .time_game_end
                    .map(|end| self.game_time(end))
                    .into(),
            ),
            _ => {
                let player: usize = path.strip_prefix("score.")?.parse().ok()?;
                self.source.score(player).map(Value::U64)
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "poll_state",
            "game_active",
            "ball_in_play",
            "time_game_start",
            "time_game_end",
            "end_hold_start",
            "games_started",
            "family",
            "player_up",
            "scores",
            "last_game_time",
            "score.<player>",
        ]
    }
}
