//! Validated memory map types.
//!
//! Every address in a `MemoryMap` is a `Span` checked against the shadow
//! memory length at load. A section that fails any check is dropped as a
//! whole and logged; the rest of the map still loads.

use pinball_core::Family;
use shadow_memory::Span;

use crate::checksum::{ChecksumMaintainer, ChecksumRegion};
use crate::raw::{
    RawBallInPlay, RawBlock, RawChecksummed, RawDisplayMessage, RawHighScores, RawInPlay, RawInt,
    RawMemory, RawTitle,
};

/// Score slots tracked per game.
pub const MAX_PLAYERS: usize = 4;

/// Packed-BCD bytes per score when the map doesn't say.
const DEFAULT_SCORE_BYTES: usize = 4;

/// Largest score field we decode (16 digits).
const MAX_SCORE_BYTES: usize = 8;

/// Display message lines a title can expose.
const MAX_MESSAGE_LINES: usize = 3;

/// How the ball-in-play byte is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallInPlayKind {
    /// `Type 1`: each ball has its own token byte (`Ball1..Ball5`).
    Tokens([Option<u8>; 5]),
    /// `Type 2`: the byte holds the ball number itself.
    Direct,
}

/// `BallInPlay` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallInPlay {
    pub address: Span,
    pub kind: BallInPlayKind,
}

impl BallInPlay {
    /// Ball number for a raw byte: `Some(0)` for no ball, `Some(1..=5)` for
    /// a recognised ball, `None` for a value that means nothing (usually a
    /// read that raced a CPU write).
    #[must_use]
    pub fn decode(&self, byte: u8) -> Option<u8> {
        if byte == 0 {
            return Some(0);
        }
        match self.kind {
            BallInPlayKind::Tokens(tokens) => tokens
                .iter()
                .position(|&token| token == Some(byte))
                .map(|i| i as u8 + 1),
            BallInPlayKind::Direct => (byte <= 9).then_some(byte),
        }
    }
}

/// Byte that reads `value` while a game is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameActiveFlag {
    pub address: Span,
    pub value: u8,
}

impl GameActiveFlag {
    #[must_use]
    pub fn is_active(&self, byte: u8) -> bool {
        byte == self.value
    }
}

/// `InPlay` section: live scores and game flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InPlay {
    /// One packed-BCD field per player.
    pub scores: [Span; MAX_PLAYERS],
    pub game_active: Option<GameActiveFlag>,
    /// Byte holding the current player number (1-based on most ROMs).
    pub player_up: Option<Span>,
}

/// `DisplayMessage` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Encoding selector from the catalog (`Type`).
    pub kind: u8,
    /// One span per display line, all the same length.
    pub lines: Vec<Span>,
    pub checksum: Option<ChecksumRegion>,
}

/// `Adjustments` section: the ROM's checksummed settings block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustments {
    pub checksum: ChecksumRegion,
}

/// `HighScores` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighScores {
    pub scores: Vec<Span>,
}

/// `Memory` section: where the mirrored RAM sits in the CPU address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWindow {
    pub start: u32,
    pub length: usize,
    /// Battery-backed part of the RAM.
    pub nv_start: u32,
    pub nv_length: usize,
}

/// Validated per-title memory map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    pub game_name: String,
    pub family: Family,
    pub memory: MemoryWindow,
    pub ball_in_play: Option<BallInPlay>,
    pub in_play: Option<InPlay>,
    pub display_message: Option<DisplayMessage>,
    pub adjustments: Option<Adjustments>,
    pub high_scores: Option<HighScores>,
    pub switches: Option<Span>,
    pub coin_drop: Option<Span>,
}

/// Name of the built-in fallback map.
const DEFAULT_TITLE: &str = "GenericSystem";

impl MemoryMap {
    /// Built-in map used when the title can't be loaded: every optional
    /// feature absent, so nothing in shadow memory is interpreted.
    #[must_use]
    pub fn safe_default(family: Family, shadow_len: usize) -> Self {
        Self {
            game_name: DEFAULT_TITLE.to_string(),
            family,
            memory: MemoryWindow {
                start: 0,
                length: shadow_len,
                nv_start: 0,
                nv_length: shadow_len,
            },
            ball_in_play: None,
            in_play: None,
            display_message: None,
            adjustments: None,
            high_scores: None,
            switches: None,
            coin_drop: None,
        }
    }

    /// Is this the built-in fallback?
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.game_name == DEFAULT_TITLE
    }

    /// Score field for `player` (0-based).
    #[must_use]
    pub fn score_span(&self, player: usize) -> Option<Span> {
        self.in_play
            .as_ref()
            .and_then(|in_play| in_play.scores.get(player).copied())
    }

    /// Checksum upkeep for every guarded region in the map.
    #[must_use]
    pub fn checksum_maintainer(&self) -> ChecksumMaintainer {
        let mut regions = Vec::new();
        if let Some(checksum) = self
            .display_message
            .as_ref()
            .and_then(|message| message.checksum)
        {
            regions.push(checksum);
        }
        if let Some(adjustments) = self.adjustments {
            regions.push(adjustments.checksum);
        }
        ChecksumMaintainer::new(regions)
    }

    /// Build a map from a catalog record, dropping invalid sections.
    pub(crate) fn from_raw(raw: RawTitle, family: Family, shadow_len: usize) -> Self {
        let title = raw.game_info.game_name.clone();
        let mut map = Self::safe_default(family, shadow_len);
        map.game_name = title.clone();

        if let Some(memory) = &raw.memory {
            map.memory = memory_window(memory, shadow_len);
        }
        map.ball_in_play = section(&title, "BallInPlay", raw.ball_in_play.as_ref(), |s| {
            ball_in_play(s, shadow_len)
        });
        map.in_play = section(&title, "InPlay", raw.in_play.as_ref(), |s| {
            in_play(s, shadow_len)
        });
        map.display_message = section(&title, "DisplayMessage", raw.display_message.as_ref(), |s| {
            display_message(s, shadow_len)
        });
        map.adjustments = section(&title, "Adjustments", raw.adjustments.as_ref(), |s| {
            checksum_region(s, shadow_len)?
                .map(|checksum| Adjustments { checksum })
                .ok_or("checksum range missing")
        });
        map.high_scores = section(&title, "HighScores", raw.high_scores.as_ref(), |s| {
            high_scores(s, shadow_len)
        });
        map.switches = section(&title, "Switches", raw.switches.as_ref(), |s| {
            block(s, shadow_len)
        });
        map.coin_drop = section(&title, "CoinDrop", raw.coin_drop.as_ref(), |s| {
            block(s, shadow_len)
        });
        map
    }
}

/// Validate one optional section, logging and dropping it on failure.
fn section<R, T>(
    title: &str,
    name: &str,
    raw: Option<&R>,
    build: impl FnOnce(&R) -> Result<T, &'static str>,
) -> Option<T> {
    match build(raw?) {
        Ok(section) => Some(section),
        Err(reason) => {
            log::warn!("{title}: dropping {name} section: {reason}");
            None
        }
    }
}

/// Optional non-negative integer field. `Err` if present but unparsable.
fn field(raw: Option<&RawInt>) -> Result<Option<usize>, &'static str> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .value()
            .and_then(|v| usize::try_from(v).ok())
            .map(Some)
            .ok_or("field is not a non-negative integer"),
    }
}

fn required(raw: Option<&RawInt>, missing: &'static str) -> Result<usize, &'static str> {
    field(raw)?.ok_or(missing)
}

fn byte(raw: Option<&RawInt>) -> Result<Option<u8>, &'static str> {
    field(raw)?
        .map(|v| u8::try_from(v).map_err(|_| "value does not fit in a byte"))
        .transpose()
}

fn span(offset: usize, len: usize, limit: usize) -> Result<Span, &'static str> {
    Span::within(offset, len, limit).ok_or("address out of range")
}

fn memory_window(raw: &RawMemory, shadow_len: usize) -> MemoryWindow {
    let get = |v: Option<&RawInt>| field(v).ok().flatten();
    let start = get(raw.start.as_ref()).unwrap_or(0) as u32;
    let length = get(raw.length.as_ref()).unwrap_or(shadow_len);
    if length != shadow_len {
        log::warn!("Memory.Length {length:#06X} differs from shadow memory {shadow_len:#06X}");
    }
    MemoryWindow {
        start,
        length,
        nv_start: get(raw.nv_start.as_ref()).map_or(start, |v| v as u32),
        nv_length: get(raw.nv_length.as_ref()).unwrap_or(length),
    }
}

fn ball_in_play(raw: &RawBallInPlay, limit: usize) -> Result<BallInPlay, &'static str> {
    let address = span(required(raw.address.as_ref(), "Address missing")?, 1, limit)?;
    let kind = match field(raw.kind.as_ref())?.unwrap_or(1) {
        0 => return Err("disabled (Type 0)"),
        1 => {
            let tokens = [
                byte(raw.ball1.as_ref())?,
                byte(raw.ball2.as_ref())?,
                byte(raw.ball3.as_ref())?,
                byte(raw.ball4.as_ref())?,
                byte(raw.ball5.as_ref())?,
            ];
            if tokens[0].is_none() {
                return Err("Ball1 token missing");
            }
            if tokens.contains(&Some(0)) {
                return Err("a ball token of 0 is indistinguishable from no ball");
            }
            BallInPlayKind::Tokens(tokens)
        }
        2 => BallInPlayKind::Direct,
        _ => return Err("unknown Type"),
    };
    Ok(BallInPlay { address, kind })
}

fn in_play(raw: &RawInPlay, limit: usize) -> Result<InPlay, &'static str> {
    let base = required(raw.score_adr.as_ref(), "ScoreAdr missing")?;
    let score_bytes = field(raw.score_bytes.as_ref())?.unwrap_or(DEFAULT_SCORE_BYTES);
    if score_bytes == 0 || score_bytes > MAX_SCORE_BYTES {
        return Err("ScoreBytes must be 1..=8");
    }
    let spacing = field(raw.score_spacing.as_ref())?.unwrap_or(score_bytes);

    let mut scores = [span(base, score_bytes, limit)?; MAX_PLAYERS];
    for (player, slot) in scores.iter_mut().enumerate() {
        let offset = player
            .checked_mul(spacing)
            .and_then(|delta| base.checked_add(delta))
            .ok_or("address out of range")?;
        *slot = span(offset, score_bytes, limit)?;
    }

    let game_active = match field(raw.game_active_adr.as_ref())? {
        Some(adr) => Some(GameActiveFlag {
            address: span(adr, 1, limit)?,
            value: byte(raw.game_active_value.as_ref())?.unwrap_or(1),
        }),
        None => None,
    };
    let player_up = field(raw.player_up.as_ref())?
        .map(|adr| span(adr, 1, limit))
        .transpose()?;

    Ok(InPlay {
        scores,
        game_active,
        player_up,
    })
}

fn checksum_region(
    raw: &RawChecksummed,
    limit: usize,
) -> Result<Option<ChecksumRegion>, &'static str> {
    let start = field(raw.checksum_start_adr.as_ref())?;
    let end = field(raw.checksum_end_adr.as_ref())?;
    let result = field(raw.checksum_result_adr.as_ref())?;
    match (start, end, result) {
        (None, None, None) => Ok(None),
        (Some(start), Some(end), Some(result)) => {
            let range = Span::inclusive(start, end, limit).ok_or("checksum range out of range")?;
            let result = span(result, 2, limit)?;
            ChecksumRegion::new(range, result)
                .map(Some)
                .ok_or("checksum result overlaps its range")
        }
        _ => Err("checksum range incomplete"),
    }
}

fn display_message(raw: &RawDisplayMessage, limit: usize) -> Result<DisplayMessage, &'static str> {
    let kind = byte(raw.kind.as_ref())?.unwrap_or(1);
    if kind == 0 {
        return Err("disabled (Type 0)");
    }
    let length = required(raw.length.as_ref(), "Length missing")?;

    let mut addresses = Vec::with_capacity(MAX_MESSAGE_LINES);
    for adr in [&raw.address_s1, &raw.address_s2, &raw.address_s3] {
        if let Some(adr) = field(adr.as_ref())? {
            addresses.push(adr);
        }
    }
    if addresses.is_empty() {
        addresses.push(required(raw.address.as_ref(), "Address missing")?);
    }
    let lines = addresses
        .into_iter()
        .map(|adr| span(adr, length, limit))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DisplayMessage {
        kind,
        lines,
        checksum: checksum_region(&raw.checksum, limit)?,
    })
}

fn high_scores(raw: &RawHighScores, limit: usize) -> Result<HighScores, &'static str> {
    let base = required(raw.score_adr.as_ref(), "ScoreAdr missing")?;
    let score_bytes = field(raw.score_bytes.as_ref())?.unwrap_or(DEFAULT_SCORE_BYTES);
    if score_bytes == 0 || score_bytes > MAX_SCORE_BYTES {
        return Err("ScoreBytes must be 1..=8");
    }
    let spacing = field(raw.score_spacing.as_ref())?.unwrap_or(score_bytes);
    let count = field(raw.count.as_ref())?.unwrap_or(MAX_PLAYERS);

    let scores = (0..count)
        .map(|i| {
            let offset = i
                .checked_mul(spacing)
                .and_then(|delta| base.checked_add(delta))
                .ok_or("address out of range")?;
            span(offset, score_bytes, limit)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HighScores { scores })
}

fn block(raw: &RawBlock, limit: usize) -> Result<Span, &'static str> {
    let address = required(raw.address.as_ref(), "Address missing")?;
    let length = field(raw.length.as_ref())?.unwrap_or(1);
    span(address, length, limit)
}
