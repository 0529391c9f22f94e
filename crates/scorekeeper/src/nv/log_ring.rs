//! Persistent text log in the logger region.
//!
//! Layout: a 4-byte header (`head: u16 BE`, `state: u16 BE`) then the
//! ring. Entries are newline-terminated text. When the ring fills, writing
//! continues from the start and overwrites the oldest entries.
//!
//! | State | Meaning                                                   |
//! |-------|-----------------------------------------------------------|
//! | 0     | not wrapped; entries run from the ring start to `head`    |
//! | 1     | wrapped; the bytes at `head` are the tail of a lost entry |
//! | 2     | wrapped; an intact entry starts at `head`                 |
//!
//! Data goes out before the header, so a power cut mid-append loses at most
//! the entry being written.

use spi_fram::{Fram, FramError, SpiDevice};

use super::Region;

const HEADER_LEN: u16 = 4;

const STATE_LINEAR: u16 = 0;
const STATE_FRAGMENT: u16 = 1;
const STATE_ALIGNED: u16 = 2;

/// Ring log on the FRAM.
#[derive(Debug, Clone)]
pub struct NvLog {
    region: Region,
    /// Next write position, relative to the start of the ring.
    head: u16,
    wrapped: bool,
    /// Wrapped and `head` sits on an entry boundary.
    aligned: bool,
}

impl NvLog {
    /// Open the log, resetting it if the stored header makes no sense.
    pub fn open<D: SpiDevice>(fram: &mut Fram<D>, region: Region) -> Result<Self, FramError> {
        let mut header = [0u8; HEADER_LEN as usize];
        fram.read(region.start, &mut header)?;
        let head = u16::from_be_bytes([header[0], header[1]]);
        let flag = u16::from_be_bytes([header[2], header[3]]);

        let mut log = Self {
            region,
            head,
            wrapped: flag != STATE_LINEAR,
            aligned: flag == STATE_ALIGNED,
        };
        if head >= log.capacity() || flag > STATE_ALIGNED {
            log::warn!("NV log header invalid (head {head:#06X}, flag {flag}), resetting");
            log.clear(fram)?;
        }
        Ok(log)
    }

    /// Bytes available for entries.
    #[must_use]
    pub const fn capacity(&self) -> u16 {
        self.region.len.saturating_sub(HEADER_LEN)
    }

    #[must_use]
    pub const fn head(&self) -> u16 {
        self.head
    }

    #[must_use]
    pub const fn wrapped(&self) -> bool {
        self.wrapped
    }

    const fn ring_start(&self) -> u16 {
        self.region.start + HEADER_LEN
    }

    fn write_header<D: SpiDevice>(&self, fram: &mut Fram<D>) -> Result<(), FramError> {
        let mut header = [0u8; HEADER_LEN as usize];
        header[..2].copy_from_slice(&self.head.to_be_bytes());
        let state = match (self.wrapped, self.aligned) {
            (false, _) => STATE_LINEAR,
            (true, false) => STATE_FRAGMENT,
            (true, true) => STATE_ALIGNED,
        };
        header[2..].copy_from_slice(&state.to_be_bytes());
        fram.write(self.region.start, &header)?;
        Ok(())
    }

    /// Append one entry. Line breaks inside `text` become spaces; an entry
    /// longer than the ring keeps its tail.
    pub fn append<D: SpiDevice>(&mut self, fram: &mut Fram<D>, text: &str) -> Result<(), FramError> {
        let capacity = usize::from(self.capacity());
        if capacity == 0 {
            return Ok(());
        }
        let mut entry: Vec<u8> = text
            .bytes()
            .map(|b| if b == b'\n' || b == b'\r' { b' ' } else { b })
            .collect();
        entry.push(b'\n');
        let truncated = entry.len() > capacity;
        if truncated {
            entry.drain(..entry.len() - capacity);
        }

        let head = usize::from(self.head);
        let next = head + entry.len();
        let aligned = if entry.len() == capacity {
            !truncated
        } else if next == capacity && !self.wrapped {
            // First wrap lands on the first entry.
            true
        } else if next >= capacity || self.wrapped {
            // The new head is on a boundary if the byte this entry's
            // newline replaces ended an older entry.
            let mut last = [0u8; 1];
            let at = (next - 1) % capacity;
            fram.read(self.ring_start() + at as u16, &mut last)?;
            last[0] == b'\n'
        } else {
            false
        };

        let first = entry.len().min(capacity - head);
        fram.write(self.ring_start() + self.head, &entry[..first])?;
        if first < entry.len() {
            fram.write(self.ring_start(), &entry[first..])?;
        }

        if next >= capacity {
            self.wrapped = true;
        }
        self.aligned = self.wrapped && aligned;
        self.head = (next % capacity) as u16;
        self.write_header(fram)
    }

    /// Entries, oldest first.
    pub fn lines<D: SpiDevice>(&self, fram: &mut Fram<D>) -> Result<Vec<String>, FramError> {
        let mut ring = vec![0u8; usize::from(self.capacity())];
        fram.read(self.ring_start(), &mut ring)?;

        let head = usize::from(self.head);
        let text: Vec<u8> = if self.wrapped {
            let mut ordered = ring[head..].to_vec();
            ordered.extend_from_slice(&ring[..head]);
            if self.aligned {
                ordered
            } else {
                match ordered.iter().position(|&b| b == b'\n') {
                    Some(end) => ordered.split_off(end + 1),
                    None => Vec::new(),
                }
            }
        } else {
            ring[..head].to_vec()
        };

        Ok(text
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect())
    }

    /// Empty the log.
    pub fn clear<D: SpiDevice>(&mut self, fram: &mut Fram<D>) -> Result<(), FramError> {
        self.head = 0;
        self.wrapped = false;
        self.aligned = false;
        self.write_header(fram)
    }
}

#[cfg(test)]
mod tests {
    use spi_fram::{DEVICE_SIZE, FramChip};

    use super::*;
    use crate::nv::{LOGGER_LEN, LOGGER_START};

    fn fram() -> Fram<FramChip> {
        Fram::new(FramChip::new(DEVICE_SIZE), DEVICE_SIZE)
    }

    #[test]
    fn appends_and_reopens() {
        let mut fram = fram();
        let region = Region::new("logger", LOGGER_START, LOGGER_LEN);
        let mut log = NvLog::open(&mut fram, region).unwrap();
        assert!(log.lines(&mut fram).unwrap().is_empty());

        log.append(&mut fram, "boot Pinbot").unwrap();
        log.append(&mut fram, "game\nover").unwrap();

        let reopened = NvLog::open(&mut fram, region).unwrap();
        assert_eq!(reopened.head(), 22);
        assert_eq!(
            reopened.lines(&mut fram).unwrap(),
            vec!["boot Pinbot", "game over"]
        );
    }

    #[test]
    fn wraps_and_drops_oldest() {
        let mut fram = fram();
        // 16-byte ring.
        let region = Region::new("logger", 0x100, 20);
        let mut log = NvLog::open(&mut fram, region).unwrap();
        log.append(&mut fram, "aaaaaa").unwrap();
        log.append(&mut fram, "bbbbbb").unwrap();
        assert!(!log.wrapped());
        log.append(&mut fram, "cccccc").unwrap();
        assert!(log.wrapped());
        assert_eq!(log.head(), 5);
        assert_eq!(log.lines(&mut fram).unwrap(), vec!["bbbbbb", "cccccc"]);
    }

    #[test]
    fn exact_fill_keeps_every_entry() {
        let mut fram = fram();
        let region = Region::new("logger", 0x100, 20);
        let mut log = NvLog::open(&mut fram, region).unwrap();
        log.append(&mut fram, "aaaaaa").unwrap();
        log.append(&mut fram, "bbbbbb").unwrap();
        log.append(&mut fram, "c").unwrap();
        assert_eq!((log.head(), log.wrapped()), (0, true));
        assert_eq!(
            log.lines(&mut fram).unwrap(),
            vec!["aaaaaa", "bbbbbb", "c"]
        );

        let mut log = NvLog::open(&mut fram, region).unwrap();
        assert_eq!(log.lines(&mut fram).unwrap().len(), 3);

        // Overwrites part of "aaaaaa": the rest of it is dropped.
        log.append(&mut fram, "dd").unwrap();
        assert_eq!(log.lines(&mut fram).unwrap(), vec!["bbbbbb", "c", "dd"]);

        // Ends exactly where "aaaaaa" ended.
        log.append(&mut fram, "eee").unwrap();
        assert_eq!(log.head(), 7);
        assert_eq!(
            log.lines(&mut fram).unwrap(),
            vec!["bbbbbb", "c", "dd", "eee"]
        );
    }

    #[test]
    fn garbage_header_resets() {
        let mut chip = FramChip::new(DEVICE_SIZE);
        let mut image = vec![0u8; DEVICE_SIZE];
        image[0x100..0x104].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x07]);
        chip.load_bytes(&image);
        let mut fram = Fram::new(chip, DEVICE_SIZE);

        let log = NvLog::open(&mut fram, Region::new("logger", 0x100, 0x40)).unwrap();
        assert_eq!((log.head(), log.wrapped()), (0, false));
        assert_eq!(fram.device().peek(0x100), 0);
    }

    #[test]
    fn oversized_entry_keeps_tail() {
        let mut fram = fram();
        let mut log = NvLog::open(&mut fram, Region::new("logger", 0x100, 12)).unwrap();
        log.append(&mut fram, "0123456789").unwrap();
        assert_eq!(log.head(), 0);
        assert!(log.wrapped());
        // The only entry lost its head to the ring size.
        assert!(log.lines(&mut fram).unwrap().is_empty());
    }
}
