//! Shadow memory: a live mirror of the pinball CPU's RAM.
//!
//! The capture hardware watches every write the original CPU makes and
//! copies the byte into this buffer. Application code only ever reads the
//! mirror; it never talks to the legacy bus directly.
//!
//! # Concurrency
//!
//! The capture side writes at any moment, including halfway through a
//! multi-byte read on this side. Nothing here locks: each cell is an
//! `AtomicU8` accessed with `Relaxed` ordering, so a single byte is never
//! torn, but two bytes read one after the other may come from different
//! CPU writes. Consumers re-derive their values every poll instead of
//! trusting any one read.
//!
//! # Layout
//!
//! | Field    | Size | Owner                    |
//! |----------|------|--------------------------|
//! | cells    | len  | capture writes, core reads (and edits messages/checksums) |
//! | activity | len  | capture increments, core reads for diagnostics |

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use pinball_core::{Observable, Value};

/// A bounds-checked window into shadow memory.
///
/// Spans are validated once, when a memory map is loaded, against the
/// length of the buffer they will be used with. Reading through a span
/// therefore never has to fail at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    offset: usize,
    len: usize,
}

impl Span {
    /// Validate `offset..offset + len` against a buffer of `limit` bytes.
    ///
    /// Returns `None` for empty spans or spans that run past `limit`.
    #[must_use]
    pub fn within(offset: usize, len: usize, limit: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if len == 0 || end > limit {
            return None;
        }
        Some(Self { offset, len })
    }

    /// Inclusive range `start..=end`, as memory maps write checksum ranges.
    #[must_use]
    pub fn inclusive(start: usize, end: usize, limit: usize) -> Option<Self> {
        if end < start {
            return None;
        }
        Self::within(start, end - start + 1, limit)
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Does `other` lie entirely inside this span?
    #[must_use]
    pub const fn contains(&self, other: &Span) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }
}

/// Shadow copy of the legacy CPU's RAM plus write activity counters.
pub struct ShadowMemory {
    /// CPU address the first cell mirrors (e.g. `0x0000` on System 11).
    base: u32,
    cells: Box<[AtomicU8]>,
    /// One wrapping counter per cell, bumped on every captured write.
    activity: Box<[AtomicU8]>,
    /// Captured writes since boot (or the last `clear_activity`).
    total_writes: AtomicU64,
}

fn zeroed(len: usize) -> Box<[AtomicU8]> {
    (0..len).map(|_| AtomicU8::new(0)).collect()
}

impl ShadowMemory {
    /// Allocate a zeroed mirror of `len` bytes starting at CPU address `base`.
    #[must_use]
    pub fn new(base: u32, len: usize) -> Self {
        Self {
            base,
            cells: zeroed(len),
            activity: zeroed(len),
            total_writes: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Validate a span against this buffer.
    #[must_use]
    pub fn span(&self, offset: usize, len: usize) -> Option<Span> {
        Span::within(offset, len, self.len())
    }

    /// Read one byte.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside the buffer. Offsets come from validated
    /// spans; an out-of-range offset is a bug in the caller.
    #[must_use]
    pub fn read_byte(&self, offset: usize) -> u8 {
        self.cells[offset].load(Ordering::Relaxed)
    }

    /// Read `buf.len()` bytes starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the end of the buffer.
    pub fn read(&self, offset: usize, buf: &mut [u8]) {
        let cells = &self.cells[offset..offset + buf.len()];
        for (dst, cell) in buf.iter_mut().zip(cells) {
            *dst = cell.load(Ordering::Relaxed);
        }
    }

    /// Read the bytes covered by a validated span into a new vector.
    #[must_use]
    pub fn read_span(&self, span: Span) -> Vec<u8> {
        let mut buf = vec![0; span.len()];
        self.read(span.offset(), &mut buf);
        buf
    }

    /// Entry point for the capture mechanism: store a byte the legacy CPU
    /// wrote and count the write.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside the buffer.
    pub fn capture_write(&self, offset: usize, value: u8) {
        self.cells[offset].store(value, Ordering::Relaxed);
        self.activity[offset].fetch_add(1, Ordering::Relaxed);
        self.total_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Core-originated edit (message text, checksum). Not counted as bus
    /// activity.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside the buffer.
    pub fn write_byte(&self, offset: usize, value: u8) {
        self.cells[offset].store(value, Ordering::Relaxed);
    }

    /// Core-originated edit of several bytes.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the end of the buffer.
    pub fn write(&self, offset: usize, data: &[u8]) {
        let cells = &self.cells[offset..offset + data.len()];
        for (cell, &byte) in cells.iter().zip(data) {
            cell.store(byte, Ordering::Relaxed);
        }
    }

    /// Load a persisted image at boot, before capture starts.
    ///
    /// If `image` is shorter than the buffer only the first `image.len()`
    /// bytes change; if longer, the excess is ignored.
    pub fn load_image(&self, image: &[u8]) {
        let len = image.len().min(self.len());
        self.write(0, &image[..len]);
    }

    /// Copy of the whole buffer.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        let mut buf = vec![0; self.len()];
        self.read(0, &mut buf);
        buf
    }

    /// Write activity counter for one byte (wraps at 256).
    #[must_use]
    pub fn activity(&self, offset: usize) -> u8 {
        self.activity[offset].load(Ordering::Relaxed)
    }

    /// Captured writes since boot or the last `clear_activity`.
    #[must_use]
    pub fn total_activity(&self) -> u64 {
        self.total_writes.load(Ordering::Relaxed)
    }

    /// Reset all activity counters.
    pub fn clear_activity(&self) {
        for counter in &*self.activity {
            counter.store(0, Ordering::Relaxed);
        }
        self.total_writes.store(0, Ordering::Relaxed);
    }
}

fn parse_offset(text: &str) -> Option<usize> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('$') {
        usize::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl Observable for ShadowMemory {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("memory.") {
            parse_offset(rest)
                .filter(|&offset| offset < self.len())
                .map(|offset| Value::U8(self.read_byte(offset)))
        } else if let Some(rest) = path.strip_prefix("activity.") {
            parse_offset(rest)
                .filter(|&offset| offset < self.len())
                .map(|offset| Value::U8(self.activity(offset)))
        } else {
            match path {
                "base" => Some(Value::U32(self.base)),
                "len" => Some(Value::U32(self.len() as u32)),
                "total_activity" => Some(self.total_activity().into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "memory.<offset>",
            "activity.<offset>",
            "base",
            "len",
            "total_activity",
        ]
    }
}
