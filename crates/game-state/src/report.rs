//! Game report handed to the network layer.

use serde::Serialize;

use memory_map::MAX_PLAYERS;

/// Live game snapshot.
///
/// Serialises with the keys the scoreboard expects:
/// `{"BallInPlay":1,"Scores":[..],"GameActive":true,"GameTime":12.5,"PlayerUp":1}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameReport {
    pub ball_in_play: u8,
    pub scores: [u64; MAX_PLAYERS],
    pub game_active: bool,
    /// Seconds since the game started (or its length, once over).
    pub game_time: f64,
    pub player_up: Option<u8>,
}
