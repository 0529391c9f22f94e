//! Checksums the legacy ROM validates.
//!
//! Several titles guard their adjustment block and message buffers with a
//! 16-bit checksum: the one's complement of the byte sum, stored big-endian
//! right after (or near) the guarded range. If shadow memory is edited
//! without fixing the checksum, the ROM resets those settings to factory
//! defaults on its next check. The fix has to land immediately; the ROM may
//! look on its very next bus cycle.

use shadow_memory::{ShadowMemory, Span};

/// `0xFFFF - (sum of bytes mod 0x10000)`.
#[must_use]
pub fn checksum16(bytes: &[u8]) -> u16 {
    let sum = bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
    0xFFFF - sum
}

/// A guarded range and where its checksum lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumRegion {
    range: Span,
    result: Span,
}

impl ChecksumRegion {
    /// Pair a range with a 2-byte result location.
    ///
    /// Returns `None` if the result is not 2 bytes wide or overlaps the
    /// guarded range (the sum would then include itself).
    #[must_use]
    pub fn new(range: Span, result: Span) -> Option<Self> {
        let overlaps = result.offset() < range.end() && range.offset() < result.end();
        if result.len() != 2 || overlaps {
            return None;
        }
        Some(Self { range, result })
    }

    #[must_use]
    pub const fn range(&self) -> Span {
        self.range
    }

    #[must_use]
    pub const fn result(&self) -> Span {
        self.result
    }

    /// Checksum of the guarded bytes as they are now.
    #[must_use]
    pub fn compute(&self, shadow: &ShadowMemory) -> u16 {
        checksum16(&shadow.read_span(self.range))
    }

    /// Checksum currently stored at the result location.
    #[must_use]
    pub fn stored(&self, shadow: &ShadowMemory) -> u16 {
        let mut be = [0u8; 2];
        shadow.read(self.result.offset(), &mut be);
        u16::from_be_bytes(be)
    }

    /// Does the stored checksum match the guarded bytes?
    #[must_use]
    pub fn verify(&self, shadow: &ShadowMemory) -> bool {
        self.compute(shadow) == self.stored(shadow)
    }

    /// Recompute and store the checksum. Returns the stored value.
    pub fn update(&self, shadow: &ShadowMemory) -> u16 {
        let sum = self.compute(shadow);
        shadow.write(self.result.offset(), &sum.to_be_bytes());
        sum
    }
}

/// Writes into shadow memory and keeps every affected checksum valid.
///
/// Holds the checksum regions of one memory map. A write that lands inside
/// a guarded range is followed, in the same call, by a checksum update for
/// that range.
#[derive(Debug, Clone, Default)]
pub struct ChecksumMaintainer {
    regions: Vec<ChecksumRegion>,
}

impl ChecksumMaintainer {
    #[must_use]
    pub fn new(regions: Vec<ChecksumRegion>) -> Self {
        Self { regions }
    }

    #[must_use]
    pub fn regions(&self) -> &[ChecksumRegion] {
        &self.regions
    }

    /// Write `data` at `offset`, then fix the checksum of every region the
    /// write touched.
    ///
    /// Returns the number of checksums updated.
    ///
    /// # Panics
    ///
    /// Panics if the write runs past the end of shadow memory.
    pub fn write(&self, shadow: &ShadowMemory, offset: usize, data: &[u8]) -> usize {
        shadow.write(offset, data);
        let end = offset + data.len();
        let mut updated = 0;
        for region in &self.regions {
            let range = region.range();
            if offset < range.end() && range.offset() < end {
                region.update(shadow);
                updated += 1;
            }
        }
        updated
    }

    /// Recompute every checksum whose stored value is stale.
    ///
    /// Returns the number of checksums rewritten.
    pub fn repair(&self, shadow: &ShadowMemory) -> usize {
        let mut repaired = 0;
        for region in &self.regions {
            if !region.verify(shadow) {
                region.update(shadow);
                repaired += 1;
            }
        }
        repaired
    }
}
