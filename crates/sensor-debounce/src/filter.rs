//! Parallel 32-channel debounce.
//!
//! The last [`DEPTH`] samples are kept in a ring. On each new sample the
//! filter walks back through the ring, ANDing samples together: after `s`
//! steps `high` has a bit set for every channel active in all of the last
//! `s` samples, and `low` for every channel idle in all of them. A channel
//! fires at the step matching its configured stage.
//!
//! A channel that scored is armed and can't score again until it has been
//! idle for its reset stage.

use pinball_core::{Observable, Value};

/// Samples kept (and the longest stage).
pub const DEPTH: usize = 16;

/// Channels per sample.
pub const CHANNELS: usize = 32;

/// Score stage given to every channel at construction.
pub const DEFAULT_SCORE_STAGE: usize = 3;

/// Reset stage given to every channel at construction.
pub const DEFAULT_RESET_STAGE: usize = 6;

const INDEX_MASK: usize = DEPTH - 1;

/// Electrical sense of the sampled inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Polarity {
    /// A set bit means the contact is closed.
    ActiveHigh,
    /// A clear bit means the contact is closed (inputs pulled up).
    #[default]
    ActiveLow,
}

/// Events produced by one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceEvents {
    pub score_hits: u32,
    pub reset_hits: u32,
}

impl DebounceEvents {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.score_hits == 0 && self.reset_hits == 0
    }

    /// Fold `other` into this set.
    pub fn merge(&mut self, other: Self) {
        self.score_hits |= other.score_hits;
        self.reset_hits |= other.reset_hits;
    }
}

/// Rejected stage assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("channel {0} out of range (0..{CHANNELS})")]
    Channel(usize),
    #[error("stage {0} out of range (1..={DEPTH})")]
    Stage(usize),
}

/// Debounce state for all channels.
pub struct DebounceFilter {
    /// Ring of normalised samples (1 = active).
    samples: [u32; DEPTH],
    /// Slot holding the newest sample.
    index: usize,
    polarity: Polarity,
    /// Armed channels (scored, waiting for a reset run).
    score_state: u32,
    /// `score_mask[s - 1]`: channels whose score stage is `s`.
    score_mask: [u32; DEPTH],
    /// `reset_mask[s - 1]`: channels whose reset stage is `s`.
    reset_mask: [u32; DEPTH],
    /// Raw value of the newest sample.
    last_raw: u32,
    processed: u64,
}

impl DebounceFilter {
    /// A filter with every channel at the default stages and nothing armed.
    #[must_use]
    pub fn new(polarity: Polarity) -> Self {
        let mut score_mask = [0; DEPTH];
        let mut reset_mask = [0; DEPTH];
        score_mask[DEFAULT_SCORE_STAGE - 1] = u32::MAX;
        reset_mask[DEFAULT_RESET_STAGE - 1] = u32::MAX;
        Self {
            samples: [0; DEPTH],
            index: 0,
            polarity,
            score_state: 0,
            score_mask,
            reset_mask,
            last_raw: 0,
            processed: 0,
        }
    }

    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Armed channels.
    #[must_use]
    pub const fn score_state(&self) -> u32 {
        self.score_state
    }

    /// Samples processed since construction.
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.processed
    }

    /// Require `stage` consecutive active samples before `channel` scores.
    ///
    /// The channel is removed from whatever score stage it had.
    pub fn set_score_stage(&mut self, channel: usize, stage: usize) -> Result<(), StageError> {
        assign(&mut self.score_mask, channel, stage)?;
        log::debug!("channel {channel}: score stage {stage}");
        Ok(())
    }

    /// Require `stage` consecutive idle samples before `channel` re-arms.
    ///
    /// The channel is removed from whatever reset stage it had.
    pub fn set_reset_stage(&mut self, channel: usize, stage: usize) -> Result<(), StageError> {
        assign(&mut self.reset_mask, channel, stage)?;
        log::debug!("channel {channel}: reset stage {stage}");
        Ok(())
    }

    /// Score stage of `channel`, or `None` if it never scores.
    #[must_use]
    pub fn score_stage(&self, channel: usize) -> Option<usize> {
        stage_of(&self.score_mask, channel)
    }

    /// Reset stage of `channel`.
    #[must_use]
    pub fn reset_stage(&self, channel: usize) -> Option<usize> {
        stage_of(&self.reset_mask, channel)
    }

    /// Stop `channel` from ever scoring (unused inputs).
    pub fn disable_channel(&mut self, channel: usize) -> Result<(), StageError> {
        if channel >= CHANNELS {
            return Err(StageError::Channel(channel));
        }
        let bit = 1u32 << channel;
        for mask in &mut self.score_mask {
            *mask &= !bit;
        }
        self.score_state &= !bit;
        log::debug!("channel {channel} disabled");
        Ok(())
    }

    /// Feed one raw sample and return the events it produced.
    pub fn process(&mut self, raw: u32) -> DebounceEvents {
        let sample = match self.polarity {
            Polarity::ActiveHigh => raw,
            Polarity::ActiveLow => !raw,
        };
        self.index = (self.index + 1) & INDEX_MASK;
        self.samples[self.index] = sample;
        self.last_raw = raw;
        self.processed = self.processed.wrapping_add(1);

        let mut high = u32::MAX;
        let mut low = u32::MAX;
        let mut score_hits = 0;
        let mut reset_hits = 0;
        for step in 0..DEPTH {
            let sample = self.samples[self.index.wrapping_sub(step) & INDEX_MASK];
            high &= sample;
            low &= !sample;
            score_hits |= high & self.score_mask[step];
            reset_hits |= low & self.reset_mask[step];
        }

        // Only idle channels can score; only armed ones can reset.
        score_hits &= !self.score_state;
        reset_hits &= self.score_state;
        self.score_state |= score_hits;
        self.score_state &= !reset_hits;

        DebounceEvents {
            score_hits,
            reset_hits,
        }
    }
}

impl Default for DebounceFilter {
    fn default() -> Self {
        Self::new(Polarity::default())
    }
}

fn assign(table: &mut [u32; DEPTH], channel: usize, stage: usize) -> Result<(), StageError> {
    if channel >= CHANNELS {
        return Err(StageError::Channel(channel));
    }
    if !(1..=DEPTH).contains(&stage) {
        return Err(StageError::Stage(stage));
    }
    let bit = 1u32 << channel;
    for mask in table.iter_mut() {
        *mask &= !bit;
    }
    table[stage - 1] |= bit;
    Ok(())
}

fn stage_of(table: &[u32; DEPTH], channel: usize) -> Option<usize> {
    if channel >= CHANNELS {
        return None;
    }
    let bit = 1u32 << channel;
    table.iter().position(|mask| mask & bit != 0).map(|i| i + 1)
}

impl Observable for DebounceFilter {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "score_state" => Some(self.score_state.into()),
            "last_sample" => Some(self.last_raw.into()),
            "processed" => Some(self.processed.into()),
            "polarity" => Some(
                match self.polarity {
                    Polarity::ActiveHigh => "high",
                    Polarity::ActiveLow => "low",
                }
                .into(),
            ),
            _ => {
                let (table, rest) = if let Some(rest) = path.strip_prefix("score_stage.") {
                    (&self.score_mask, rest)
                } else if let Some(rest) = path.strip_prefix("reset_stage.") {
                    (&self.reset_mask, rest)
                } else {
                    return None;
                };
                let channel: usize = rest.parse().ok()?;
                if channel >= CHANNELS {
                    return None;
                }
                Some(stage_of(table, channel).map(|s| s as u8).into())
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "score_state",
            "last_sample",
            "processed",
            "polarity",
            "score_stage.<channel>",
            "reset_stage.<channel>",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(filter: &mut DebounceFilter, raw: u32, n: usize) -> Vec<DebounceEvents> {
        (0..n).map(|_| filter.process(raw)).collect()
    }

    #[test]
    fn channel_zero_scores_on_third_low_sample() {
        let mut filter = DebounceFilter::new(Polarity::ActiveLow);
        filter.set_score_stage(0, 3).unwrap();

        let idle = feed(&mut filter, 0xFFFF_FFFF, 2);
        assert!(idle.iter().all(DebounceEvents::is_empty));

        let run = feed(&mut filter, 0xFFFF_FFFE, 5);
        let hits: Vec<u32> = run.iter().map(|e| e.score_hits).collect();
        assert_eq!(hits, vec![0, 0, 1, 0, 0]);
        assert_eq!(filter.score_state(), 1);
    }

    #[test]
    fn no_second_score_without_reset_run() {
        let mut filter = DebounceFilter::new(Polarity::ActiveHigh);
        filter.set_score_stage(4, 2).unwrap();
        filter.set_reset_stage(4, 5).unwrap();
        let bit = 1 << 4;

        let first = feed(&mut filter, bit, 2);
        assert_eq!(first[1].score_hits, bit);

        // Idle for only 4 samples: still armed.
        let short = feed(&mut filter, 0, 4);
        assert!(short.iter().all(|e| e.reset_hits == 0));
        let again = feed(&mut filter, bit, 3);
        assert!(again.iter().all(|e| e.score_hits == 0));

        // Idle for the full reset stage, then active again.
        let reset = feed(&mut filter, 0, 5);
        assert_eq!(reset[4].reset_hits, bit);
        assert_eq!(filter.score_state(), 0);
        let second = feed(&mut filter, bit, 2);
        assert_eq!(second[0].score_hits, 0);
        assert_eq!(second[1].score_hits, bit);
    }

    #[test]
    fn score_needs_consecutive_samples() {
        let mut filter = DebounceFilter::new(Polarity::ActiveHigh);
        filter.set_score_stage(7, 4).unwrap();
        let bit = 1 << 7;
        for raw in [bit, bit, bit, 0, bit, bit, bit] {
            assert_eq!(filter.process(raw).score_hits, 0);
        }
        assert_eq!(filter.process(bit).score_hits, bit);
    }

    #[test]
    fn stage_one_is_current_sample() {
        let mut filter = DebounceFilter::new(Polarity::ActiveHigh);
        filter.set_score_stage(31, 1).unwrap();
        assert_eq!(filter.process(0x8000_0000).score_hits, 0x8000_0000);
    }

    #[test]
    fn full_depth_stage() {
        let mut filter = DebounceFilter::new(Polarity::ActiveHigh);
        filter.set_score_stage(0, DEPTH).unwrap();
        let hits = feed(&mut filter, 1, DEPTH);
        assert_eq!(hits[DEPTH - 2].score_hits, 0);
        assert_eq!(hits[DEPTH - 1].score_hits, 1);
    }

    #[test]
    fn stage_assignment_is_exclusive() {
        let mut filter = DebounceFilter::default();
        assert_eq!(filter.score_stage(5), Some(DEFAULT_SCORE_STAGE));
        filter.set_score_stage(5, 9).unwrap();
        assert_eq!(filter.score_stage(5), Some(9));
        filter.set_score_stage(5, 2).unwrap();
        assert_eq!(filter.score_stage(5), Some(2));
        let holders = filter.score_mask.iter().filter(|m| *m & (1 << 5) != 0).count();
        assert_eq!(holders, 1);

        filter.set_reset_stage(5, 16).unwrap();
        assert_eq!(filter.reset_stage(5), Some(16));
        assert_eq!(filter.reset_stage(6), Some(DEFAULT_RESET_STAGE));
    }

    #[test]
    fn bad_stage_rejected() {
        let mut filter = DebounceFilter::default();
        assert_eq!(filter.set_score_stage(32, 3), Err(StageError::Channel(32)));
        assert_eq!(filter.set_score_stage(0, 0), Err(StageError::Stage(0)));
        assert_eq!(filter.set_reset_stage(0, 17), Err(StageError::Stage(17)));
    }

    #[test]
    fn disabled_channel_never_scores() {
        let mut filter = DebounceFilter::new(Polarity::ActiveHigh);
        filter.disable_channel(2).unwrap();
        let hits = feed(&mut filter, 0b111, 4);
        assert_eq!(hits[2].score_hits, 0b011);
        assert_eq!(filter.score_stage(2), None);
    }

    #[test]
    fn ring_wraps() {
        let mut filter = DebounceFilter::new(Polarity::ActiveHigh);
        filter.set_score_stage(0, 3).unwrap();
        filter.set_reset_stage(0, 3).unwrap();
        let mut scores = 0;
        for _ in 0..10 {
            scores += feed(&mut filter, 1, 3).iter().filter(|e| e.score_hits != 0).count();
            feed(&mut filter, 0, 3);
        }
        assert_eq!(scores, 10);
    }

    #[test]
    fn observable_paths() {
        let mut filter = DebounceFilter::new(Polarity::ActiveHigh);
        filter.set_score_stage(3, 5).unwrap();
        filter.process(0x10);
        assert_eq!(filter.query("last_sample"), Some(Value::U32(0x10)));
        assert_eq!(filter.query("score_stage.3"), Some(Value::U8(5)));
        assert_eq!(filter.query("score_stage.32"), None);
        assert_eq!(filter.query("polarity"), Some(Value::from("high")));
    }
}
