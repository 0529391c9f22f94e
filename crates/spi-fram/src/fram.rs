//! Chunked FRAM driver.

use shadow_memory::ShadowMemory;

use crate::device::SpiDevice;
use crate::error::FramError;
use crate::{OP_RDSR, OP_READ, OP_WREN, OP_WRITE};

/// Largest payload moved in one transaction.
pub const CHUNK_SIZE: usize = 16;

/// Device address where the shadow memory image is kept.
pub const SHADOW_IMAGE_BASE: u16 = 0x0000;

/// Largest part reachable with 16-bit addresses.
pub const MAX_DEVICE_SIZE: usize = 0x1_0000;

/// Opcode plus two address bytes.
const HEADER_LEN: usize = 3;

/// FRAM driver over an exclusively owned SPI device.
pub struct Fram<D: SpiDevice> {
    device: D,
    /// Device capacity in bytes.
    size: usize,
}

impl<D: SpiDevice> Fram<D> {
    /// Wrap `device`, a part of `size` bytes.
    ///
    /// Only the first [`MAX_DEVICE_SIZE`] bytes of a larger part are used.
    #[must_use]
    pub fn new(device: D, size: usize) -> Self {
        if size > MAX_DEVICE_SIZE {
            log::warn!("FRAM of {size:#X} bytes, using the first {MAX_DEVICE_SIZE:#X}");
        }
        Self {
            device,
            size: size.min(MAX_DEVICE_SIZE),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Give the SPI device back.
    pub fn into_inner(self) -> D {
        self.device
    }

    fn check_range(&self, address: usize, len: usize) -> Result<(), FramError> {
        match address.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(FramError::OutOfRange {
                address,
                len,
                size: self.size,
            }),
        }
    }

    fn transact(&mut self, address: u16, tx: &[u8], rx: &mut [u8]) -> Result<(), FramError> {
        self.device
            .transaction(tx, rx)
            .map_err(|e| FramError::Bus {
                address,
                source: Box::new(e),
            })
    }

    /// Read the status register.
    pub fn read_status(&mut self) -> Result<u8, FramError> {
        let mut status = [0u8; 1];
        self.transact(0, &[OP_RDSR], &mut status)?;
        Ok(status[0])
    }

    /// Write `data` at `address`.
    ///
    /// Chunks are measured from `address`, not from device page boundaries,
    /// so a record of up to [`CHUNK_SIZE`] bytes always goes out in a single
    /// frame and a power cut can't leave half of it written.
    ///
    /// Returns the number of write frames issued.
    pub fn write(&mut self, address: u16, data: &[u8]) -> Result<usize, FramError> {
        self.check_range(address as usize, data.len())?;

        let mut frame = [0u8; HEADER_LEN + CHUNK_SIZE];
        let mut frames = 0;
        for (i, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            let chunk_addr = address + (i * CHUNK_SIZE) as u16;

            // The latch clears itself after every write frame.
            self.transact(chunk_addr, &[OP_WREN], &mut [])?;

            frame[0] = OP_WRITE;
            frame[1..HEADER_LEN].copy_from_slice(&chunk_addr.to_be_bytes());
            frame[HEADER_LEN..HEADER_LEN + chunk.len()].copy_from_slice(chunk);
            self.transact(chunk_addr, &frame[..HEADER_LEN + chunk.len()], &mut [])?;
            frames += 1;
        }
        Ok(frames)
    }

    /// Fill `buf` from `address`.
    pub fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), FramError> {
        self.check_range(address as usize, buf.len())?;

        for (i, chunk) in buf.chunks_mut(CHUNK_SIZE).enumerate() {
            let chunk_addr = address + (i * CHUNK_SIZE) as u16;
            let [hi, lo] = chunk_addr.to_be_bytes();
            self.transact(chunk_addr, &[OP_READ, hi, lo], chunk)?;
        }
        Ok(())
    }

    /// Boot restore: copy the persisted image into shadow memory, one chunk
    /// at a time.
    ///
    /// Must run before the capture mechanism starts writing.
    pub fn restore_all(&mut self, shadow: &ShadowMemory) -> Result<(), FramError> {
        self.check_range(SHADOW_IMAGE_BASE as usize, shadow.len())?;

        let mut chunk = [0u8; CHUNK_SIZE];
        for offset in (0..shadow.len()).step_by(CHUNK_SIZE) {
            let len = CHUNK_SIZE.min(shadow.len() - offset);
            let buf = &mut chunk[..len];
            self.read(SHADOW_IMAGE_BASE + offset as u16, buf)?;
            shadow.write(offset, buf);
        }
        log::debug!("restored {:#06X} bytes of shadow memory", shadow.len());
        Ok(())
    }

    /// Write the whole of shadow memory back to the device.
    ///
    /// Each chunk is read from shadow memory just before it is sent, so a
    /// chunk is internally as fresh as possible; chunks are not consistent
    /// with one another.
    pub fn write_all_now(&mut self, shadow: &ShadowMemory) -> Result<(), FramError> {
        self.check_range(SHADOW_IMAGE_BASE as usize, shadow.len())?;

        let mut chunk = [0u8; CHUNK_SIZE];
        for offset in (0..shadow.len()).step_by(CHUNK_SIZE) {
            let len = CHUNK_SIZE.min(shadow.len() - offset);
            let buf = &mut chunk[..len];
            shadow.read(offset, buf);
            self.write(SHADOW_IMAGE_BASE + offset as u16, buf)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::FramChip;
    use crate::{DEVICE_SIZE, OP_WRDI, STATUS_WEL};

    fn make_fram() -> Fram<FramChip> {
        Fram::new(FramChip::new(DEVICE_SIZE), DEVICE_SIZE)
    }

    #[test]
    fn write_then_read() {
        let mut fram = make_fram();
        let data: Vec<u8> = (0..40).collect();
        let frames = fram.write(0x1234, &data).unwrap();
        assert_eq!(frames, 3);

        let mut back = vec![0; 40];
        fram.read(0x1234, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn every_write_frame_is_preceded_by_wren() {
        let mut fram = make_fram();
        fram.write(0x0100, &[0xAA; 33]).unwrap();
        let ops: Vec<u8> = fram.device().opcode_log().to_vec();
        assert_eq!(
            ops,
            vec![OP_WREN, OP_WRITE, OP_WREN, OP_WRITE, OP_WREN, OP_WRITE]
        );
    }

    #[test]
    fn small_record_is_one_frame_even_across_page_boundary() {
        let mut fram = make_fram();
        // 12 bytes straddling a 16-byte boundary still go out as one frame.
        let frames = fram.write(0x000A, &[0x55; 12]).unwrap();
        assert_eq!(frames, 1);
    }

    #[test]
    fn latch_clears_after_write() {
        let mut fram = make_fram();
        fram.write(0, &[1]).unwrap();
        assert_eq!(fram.read_status().unwrap() & STATUS_WEL, 0);
    }

    #[test]
    fn write_without_latch_is_ignored_by_chip() {
        let mut chip = FramChip::new(DEVICE_SIZE);
        chip.transaction(&[OP_WREN], &mut []).unwrap();
        chip.transaction(&[OP_WRDI], &mut []).unwrap();
        chip.transaction(&[OP_WRITE, 0x00, 0x10, 0x99], &mut []).unwrap();
        assert_eq!(chip.peek(0x10), 0);
    }

    #[test]
    fn out_of_range_rejected_before_transfer() {
        let mut fram = make_fram();
        let err = fram.write(0x7FF8, &[0; 16]).unwrap_err();
        assert!(matches!(err, FramError::OutOfRange { .. }));
        assert!(fram.device().opcode_log().is_empty());

        let mut buf = [0; 2];
        assert!(fram.read(0x7FFF, &mut buf).is_err());
    }

    #[test]
    fn oversized_part_is_limited_to_address_space() {
        let mut fram = Fram::new(FramChip::new(0x2_0000), 0x2_0000);
        assert_eq!(fram.size(), MAX_DEVICE_SIZE);

        fram.write(0xFFE0, &[0x3C; 32]).unwrap();
        assert_eq!(fram.device().peek(0xFFFF), 0x3C);
        assert_eq!(fram.device().peek(0x1_0000), 0);

        assert!(matches!(
            fram.write(0xFFF8, &[0; 16]),
            Err(FramError::OutOfRange { .. })
        ));
    }

    #[test]
    fn bus_fault_is_surfaced_without_retry() {
        let mut fram = make_fram();
        fram.device_mut().fail_at(3);
        let err = fram.write(0x0200, &[7; 48]).unwrap_err();
        match err {
            FramError::Bus { address, .. } => assert_eq!(address, 0x0210),
            other @ FramError::OutOfRange { .. } => panic!("unexpected {other}"),
        }
        // First chunk landed, second did not.
        assert_eq!(fram.device().peek(0x0200), 7);
        assert_eq!(fram.device().peek(0x0210), 0);
        // WREN, WRITE, WREN(fails) - nothing after the fault.
        assert_eq!(fram.device().opcode_log().len(), 3);
    }

    #[test]
    fn persistence_round_trip_with_chunk_boundaries() {
        let mut fram = make_fram();
        // Odd length so the last chunk is partial.
        let source = ShadowMemory::new(0, 0x7F3);
        for offset in 0..source.len() {
            source.capture_write(offset, (offset * 7 + offset / 16) as u8);
        }
        // Mark the bytes either side of each chunk boundary.
        for boundary in (CHUNK_SIZE..source.len()).step_by(CHUNK_SIZE) {
            source.write_byte(boundary - 1, 0xA5);
            source.write_byte(boundary, 0x5A);
        }
        fram.write_all_now(&source).unwrap();

        let restored = ShadowMemory::new(0, 0x7F3);
        fram.restore_all(&restored).unwrap();
        assert_eq!(restored.snapshot(), source.snapshot());
    }

    #[test]
    fn restore_rejects_oversized_shadow() {
        let mut fram = Fram::new(FramChip::new(0x100), 0x100);
        let shadow = ShadowMemory::new(0, 0x200);
        assert!(matches!(
            fram.restore_all(&shadow),
            Err(FramError::OutOfRange { .. })
        ));
    }
}
