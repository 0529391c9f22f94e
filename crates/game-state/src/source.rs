//! Where ball-in-play readings come from.

use std::sync::Arc;

use memory_map::{BallInPlay, InPlay, MAX_PLAYERS, MemoryMap};
use pinball_core::Millis;
use shadow_memory::ShadowMemory;

use crate::bcd::decode_bcd;

/// Capability the engine polls.
///
/// Only `ball_in_play` is required. The rest default to "not available".
pub trait BallInPlaySource {
    /// Current ball number: `Some(0)` for no ball, `None` if the reading
    /// is not trustworthy right now.
    fn ball_in_play(&self) -> Option<u8>;

    /// Secondary "game running" flag, when the hardware has one.
    fn game_active_flag(&self) -> Option<bool> {
        None
    }

    /// Score of `player` (0-based).
    fn score(&self, _player: usize) -> Option<u64> {
        None
    }

    /// Player whose turn it is, as the machine numbers them.
    fn player_up(&self) -> Option<u8> {
        None
    }

    /// Called at the start of every poll, before any reading.
    fn refresh(&mut self, _now: Millis) {}
}

/// Readings taken from shadow memory through a title's memory map.
pub struct ShadowSource {
    shadow: Arc<ShadowMemory>,
    ball_in_play: Option<BallInPlay>,
    in_play: Option<InPlay>,
}

impl ShadowSource {
    #[must_use]
    pub fn new(shadow: Arc<ShadowMemory>, map: &MemoryMap) -> Self {
        Self {
            shadow,
            ball_in_play: map.ball_in_play,
            in_play: map.in_play.clone(),
        }
    }

    #[must_use]
    pub fn shadow(&self) -> &ShadowMemory {
        &self.shadow
    }
}

impl BallInPlaySource for ShadowSource {
    fn ball_in_play(&self) -> Option<u8> {
        // No mapping: a game is never seen.
        let Some(bip) = self.ball_in_play else {
            return Some(0);
        };
        bip.decode(self.shadow.read_byte(bip.address.offset()))
    }

    fn game_active_flag(&self) -> Option<bool> {
        let flag = self.in_play.as_ref()?.game_active?;
        Some(flag.is_active(self.shadow.read_byte(flag.address.offset())))
    }

    fn score(&self, player: usize) -> Option<u64> {
        if player >= MAX_PLAYERS {
            return None;
        }
        let span = self.in_play.as_ref()?.scores[player];
        Some(decode_bcd(&self.shadow.read_span(span)))
    }

    fn player_up(&self) -> Option<u8> {
        let span = self.in_play.as_ref()?.player_up?;
        Some(self.shadow.read_byte(span.offset()))
    }
}

#[cfg(test)]
mod tests {
    use pinball_core::Family;
    use shadow_memory::Span;

    use super::*;
    use memory_map::{BallInPlayKind, GameActiveFlag};

    fn map(shadow: &ShadowMemory) -> MemoryMap {
        let mut map = MemoryMap::safe_default(Family::Wpc, shadow.len());
        map.ball_in_play = Some(BallInPlay {
            address: shadow.span(0x40, 1).unwrap(),
            kind: BallInPlayKind::Direct,
        });
        let score = |offset| Span::within(offset, 4, shadow.len()).unwrap();
        map.in_play = Some(InPlay {
            scores: [score(0x100), score(0x104), score(0x108), score(0x10C)],
            game_active: Some(GameActiveFlag {
                address: shadow.span(0x41, 1).unwrap(),
                value: 0x80,
            }),
            player_up: shadow.span(0x42, 1),
        });
        map
    }

    #[test]
    fn reads_through_map() {
        let shadow = Arc::new(ShadowMemory::new(0, 0x2000));
        let source = ShadowSource::new(Arc::clone(&shadow), &map(&shadow));

        shadow.capture_write(0x40, 3);
        shadow.capture_write(0x41, 0x80);
        shadow.capture_write(0x42, 2);
        shadow.write(0x104, &[0x00, 0x25, 0x10, 0x00]);

        assert_eq!(source.ball_in_play(), Some(3));
        assert_eq!(source.game_active_flag(), Some(true));
        assert_eq!(source.player_up(), Some(2));
        assert_eq!(source.score(1), Some(251_000));
        assert_eq!(source.score(0), Some(0));
        assert_eq!(source.score(4), None);

        shadow.capture_write(0x40, 0xEE);
        assert_eq!(source.ball_in_play(), None);
    }

    #[test]
    fn unmapped_title_reads_idle() {
        let shadow = Arc::new(ShadowMemory::new(0, 0x800));
        let default = MemoryMap::safe_default(Family::Sys11, 0x800);
        let source = ShadowSource::new(shadow, &default);
        assert_eq!(source.ball_in_play(), Some(0));
        assert_eq!(source.game_active_flag(), None);
        assert_eq!(source.score(0), None);
    }
}
