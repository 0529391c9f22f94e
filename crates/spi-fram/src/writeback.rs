//! Incremental shadow memory writeback.
//!
//! Writing the full 8K image every 100 ms costs 512 frames. Most polls only
//! a handful of bytes changed, so `Writeback` remembers what the device
//! holds and sends just the chunks that differ.

use pinball_core::{Observable, Value};
use shadow_memory::ShadowMemory;

use crate::device::SpiDevice;
use crate::error::FramError;
use crate::fram::{CHUNK_SIZE, Fram, SHADOW_IMAGE_BASE};

/// Tracks the persisted copy of shadow memory.
#[derive(Default)]
pub struct Writeback {
    /// What the device holds, or `None` before the first full write.
    persisted: Option<Vec<u8>>,
    /// Completed `sync` calls.
    syncs: u64,
    /// Chunks written across all syncs.
    chunks_written: u64,
}

impl Writeback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the device and shadow memory match (right after
    /// `restore_all`), so the first sync can be incremental.
    pub fn mark_restored(&mut self, shadow: &ShadowMemory) {
        self.persisted = Some(shadow.snapshot());
    }

    /// Forget the persisted copy; the next sync rewrites everything.
    pub fn invalidate(&mut self) {
        self.persisted = None;
    }

    /// Persist the chunks of `shadow` that changed since the last sync.
    ///
    /// The persisted copy is only updated for chunks that were written
    /// successfully, so after an error the next call retries exactly the
    /// chunks that are still stale.
    ///
    /// Returns the number of chunks written.
    pub fn sync<D: SpiDevice>(
        &mut self,
        fram: &mut Fram<D>,
        shadow: &ShadowMemory,
    ) -> Result<usize, FramError> {
        let current = shadow.snapshot();
        let persisted = match &mut self.persisted {
            Some(persisted) if persisted.len() == current.len() => persisted,
            _ => {
                fram.write_all_now(shadow)?;
                self.persisted = Some(current);
                let chunks = shadow.len().div_ceil(CHUNK_SIZE);
                self.syncs += 1;
                self.chunks_written += chunks as u64;
                log::debug!("writeback: full image, {chunks} chunks");
                return Ok(chunks);
            }
        };

        let mut written = 0;
        for (offset, (now, then)) in current
            .chunks(CHUNK_SIZE)
            .zip(persisted.chunks_mut(CHUNK_SIZE))
            .enumerate()
            .map(|(i, pair)| (i * CHUNK_SIZE, pair))
        {
            if now == then {
                continue;
            }
            let result = fram.write(SHADOW_IMAGE_BASE + offset as u16, now);
            if let Err(e) = result {
                self.chunks_written += written as u64;
                return Err(e);
            }
            then.copy_from_slice(now);
            written += 1;
        }

        self.syncs += 1;
        self.chunks_written += written as u64;
        if written > 0 {
            log::debug!("writeback: {written} chunks");
        }
        Ok(written)
    }

    #[must_use]
    pub fn syncs(&self) -> u64 {
        self.syncs
    }

    #[must_use]
    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }
}

impl Observable for Writeback {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "syncs" => Some(self.syncs.into()),
            "chunks_written" => Some(self.chunks_written.into()),
            "primed" => Some(self.persisted.is_some().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["syncs", "chunks_written", "primed"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEVICE_SIZE, FramChip, OP_WRITE};

    fn make_fram() -> Fram<FramChip> {
        Fram::new(FramChip::new(DEVICE_SIZE), DEVICE_SIZE)
    }

    fn write_frames(fram: &Fram<FramChip>) -> usize {
        fram.device()
            .opcode_log()
            .iter()
            .filter(|&&op| op == OP_WRITE)
            .count()
    }

    #[test]
    fn first_sync_writes_everything() {
        let mut fram = make_fram();
        let shadow = ShadowMemory::new(0, 0x800);
        let mut wb = Writeback::new();
        assert_eq!(wb.sync(&mut fram, &shadow).unwrap(), 0x80);
        assert_eq!(write_frames(&fram), 0x80);
    }

    #[test]
    fn later_syncs_write_only_dirty_chunks() {
        let mut fram = make_fram();
        let shadow = ShadowMemory::new(0, 0x800);
        let mut wb = Writeback::new();
        wb.sync(&mut fram, &shadow).unwrap();

        assert_eq!(wb.sync(&mut fram, &shadow).unwrap(), 0);

        shadow.capture_write(0x0F, 1); // chunk 0
        shadow.capture_write(0x10, 2); // chunk 1
        shadow.capture_write(0x7FF, 3); // last chunk
        assert_eq!(wb.sync(&mut fram, &shadow).unwrap(), 3);
        assert_eq!(fram.device().peek(0x0F), 1);
        assert_eq!(fram.device().peek(0x10), 2);
        assert_eq!(fram.device().peek(0x7FF), 3);
        assert_eq!(wb.chunks_written(), 0x80 + 3);
    }

    #[test]
    fn restored_image_needs_no_rewrite() {
        let mut fram = make_fram();
        fram.device_mut().load_bytes(&[0x42; 0x800]);
        let shadow = ShadowMemory::new(0, 0x800);
        fram.restore_all(&shadow).unwrap();

        let mut wb = Writeback::new();
        wb.mark_restored(&shadow);
        assert_eq!(wb.sync(&mut fram, &shadow).unwrap(), 0);
        assert_eq!(write_frames(&fram), 0);
    }

    #[test]
    fn failed_chunk_is_retried_next_sync() {
        let mut fram = make_fram();
        let shadow = ShadowMemory::new(0, 0x100);
        let mut wb = Writeback::new();
        wb.sync(&mut fram, &shadow).unwrap();

        shadow.capture_write(0x00, 0x11);
        shadow.capture_write(0x20, 0x22);
        // WREN+WRITE for chunk 0 succeed, WREN for chunk 2 fails.
        fram.device_mut().fail_at(3);
        assert!(wb.sync(&mut fram, &shadow).is_err());
        assert_eq!(fram.device().peek(0x00), 0x11);
        assert_eq!(fram.device().peek(0x20), 0);

        assert_eq!(wb.sync(&mut fram, &shadow).unwrap(), 1);
        assert_eq!(fram.device().peek(0x20), 0x22);
    }

    #[test]
    fn invalidate_forces_full_write() {
        let mut fram = make_fram();
        let shadow = ShadowMemory::new(0, 0x40);
        let mut wb = Writeback::new();
        wb.sync(&mut fram, &shadow).unwrap();
        wb.invalidate();
        assert_eq!(wb.query("primed"), Some(Value::Bool(false)));
        assert_eq!(wb.sync(&mut fram, &shadow).unwrap(), 4);
    }
}
