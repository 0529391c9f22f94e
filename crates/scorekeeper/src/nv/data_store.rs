//! Named records in the data store region.
//!
//! The record table is fixed when the store is built. Each record owns a
//! slot of `capacity + RECORD_OVERHEAD` bytes:
//!
//! ```text
//! len (u16 BE) | payload (len bytes) | checksum (u16 BE)
//! ```
//!
//! The checksum covers the length and the payload, so a slot that was never
//! written (or was half written when power went) reads back as corrupt
//! rather than as a plausible record.

use memory_map::checksum16;
use serde::Serialize;
use serde::de::DeserializeOwned;
use spi_fram::{Fram, FramError, SpiDevice};

use super::{LayoutError, Region};

/// Length and checksum bytes around every payload.
pub const RECORD_OVERHEAD: usize = 4;

/// Record table used by the scorekeeper.
const STANDARD_RECORDS: &[(&str, u16)] = &[
    ("leaderboard", 0x1000),
    ("tournament", 0x1000),
    ("last_game", 0x0100),
    ("settings", 0x0400),
];

/// Data store and profile errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no record named {0:?}")]
    UnknownRecord(String),
    #[error("{len} bytes do not fit in {name:?} ({capacity} bytes)")]
    TooLarge {
        name: String,
        len: usize,
        capacity: usize,
    },
    #[error("{0} failed its checksum")]
    Corrupt(String),
    #[error("profile slot {0} does not exist")]
    NoSlot(usize),
    #[error("profile slot {0} is empty")]
    EmptySlot(usize),
    #[error("title has no adjustments block")]
    NoAdjustments,
    #[error("record encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error(transparent)]
    Fram(#[from] FramError),
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    name: &'static str,
    address: u16,
    capacity: u16,
}

/// Fixed table of named records.
#[derive(Debug, Clone)]
pub struct DataStore {
    region: Region,
    slots: Vec<Slot>,
}

impl DataStore {
    /// Lay out `records` (name, capacity) back to back from the start of
    /// `region`.
    pub fn new(region: Region, records: &[(&'static str, u16)]) -> Result<Self, LayoutError> {
        let mut slots = Vec::with_capacity(records.len());
        let mut offset = 0usize;
        for &(name, capacity) in records {
            slots.push(Slot {
                name,
                address: (region.start as usize + offset) as u16,
                capacity,
            });
            offset += capacity as usize + RECORD_OVERHEAD;
        }
        if offset > region.len as usize {
            return Err(LayoutError::TooSmall {
                region: region.name,
                len: region.len as usize,
                needed: offset,
            });
        }
        Ok(Self { region, slots })
    }

    /// The scorekeeper's record table.
    pub fn standard(region: Region) -> Result<Self, LayoutError> {
        Self::new(region, STANDARD_RECORDS)
    }

    #[must_use]
    pub const fn region(&self) -> Region {
        self.region
    }

    /// Record names in table order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|slot| slot.name)
    }

    /// Largest payload `name` can hold.
    #[must_use]
    pub fn capacity(&self, name: &str) -> Option<usize> {
        self.slot(name).ok().map(|slot| slot.capacity as usize)
    }

    fn slot(&self, name: &str) -> Result<Slot, StoreError> {
        self.slots
            .iter()
            .find(|slot| slot.name == name)
            .copied()
            .ok_or_else(|| StoreError::UnknownRecord(name.to_string()))
    }

    /// Replace the payload of `name`. Returns the write frames used.
    pub fn write<D: SpiDevice>(
        &self,
        fram: &mut Fram<D>,
        name: &str,
        payload: &[u8],
    ) -> Result<usize, StoreError> {
        let slot = self.slot(name)?;
        let len = u16::try_from(payload.len())
            .ok()
            .filter(|&len| len <= slot.capacity)
            .ok_or_else(|| StoreError::TooLarge {
                name: name.to_string(),
                len: payload.len(),
                capacity: slot.capacity as usize,
            })?;

        let mut record = Vec::with_capacity(payload.len() + RECORD_OVERHEAD);
        record.extend_from_slice(&len.to_be_bytes());
        record.extend_from_slice(payload);
        let sum = checksum16(&record);
        record.extend_from_slice(&sum.to_be_bytes());
        Ok(fram.write(slot.address, &record)?)
    }

    /// Read back the payload of `name`, verifying its checksum.
    pub fn read<D: SpiDevice>(
        &self,
        fram: &mut Fram<D>,
        name: &str,
    ) -> Result<Vec<u8>, StoreError> {
        let slot = self.slot(name)?;
        let mut len = [0u8; 2];
        fram.read(slot.address, &mut len)?;
        let payload_len = u16::from_be_bytes(len);
        if payload_len > slot.capacity {
            return Err(StoreError::Corrupt(name.to_string()));
        }

        let mut record = vec![0u8; 2 + payload_len as usize + 2];
        fram.read(slot.address, &mut record)?;
        let (body, stored) = record.split_at(record.len() - 2);
        if checksum16(body) != u16::from_be_bytes([stored[0], stored[1]]) {
            return Err(StoreError::Corrupt(name.to_string()));
        }
        Ok(body[2..].to_vec())
    }

    /// Store `value` as JSON.
    pub fn write_json<D: SpiDevice, T: Serialize>(
        &self,
        fram: &mut Fram<D>,
        name: &str,
        value: &T,
    ) -> Result<usize, StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.write(fram, name, &bytes)
    }

    /// Load a JSON record.
    pub fn read_json<D: SpiDevice, T: DeserializeOwned>(
        &self,
        fram: &mut Fram<D>,
        name: &str,
    ) -> Result<T, StoreError> {
        let bytes = self.read(fram, name)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Reset `name` to a valid empty record.
    pub fn erase<D: SpiDevice>(&self, fram: &mut Fram<D>, name: &str) -> Result<(), StoreError> {
        self.write(fram, name, &[])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use spi_fram::{DEVICE_SIZE, FramChip};

    use super::*;
    use crate::nv::{DATA_STORE_LEN, DATA_STORE_START};

    fn setup() -> (DataStore, Fram<FramChip>) {
        let region = Region::new("data store", DATA_STORE_START, DATA_STORE_LEN);
        (
            DataStore::standard(region).unwrap(),
            Fram::new(FramChip::new(DEVICE_SIZE), DEVICE_SIZE),
        )
    }

    #[test]
    fn record_round_trip() {
        let (store, mut fram) = setup();
        store.write(&mut fram, "settings", b"volume=7").unwrap();
        assert_eq!(store.read(&mut fram, "settings").unwrap(), b"volume=7");
    }

    #[test]
    fn small_record_is_one_frame() {
        let (store, mut fram) = setup();
        assert_eq!(store.write(&mut fram, "last_game", &[1; 12]).unwrap(), 1);
        assert_eq!(store.write(&mut fram, "last_game", &[1; 13]).unwrap(), 2);
    }

    #[test]
    fn blank_slot_is_corrupt() {
        let (store, mut fram) = setup();
        assert!(matches!(
            store.read(&mut fram, "leaderboard"),
            Err(StoreError::Corrupt(_))
        ));
        store.erase(&mut fram, "leaderboard").unwrap();
        assert_eq!(store.read(&mut fram, "leaderboard").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn flipped_byte_detected() {
        let (store, mut fram) = setup();
        store.write(&mut fram, "settings", b"abc").unwrap();
        let address = DATA_STORE_START as usize + 0x1000 * 2 + 0x100 + RECORD_OVERHEAD * 3 + 3;
        let mut chip = fram.into_inner();
        let mut bytes = chip.as_bytes().to_vec();
        bytes[address] ^= 0x01;
        chip.load_bytes(&bytes);
        let mut fram = Fram::new(chip, DEVICE_SIZE);
        assert!(matches!(
            store.read(&mut fram, "settings"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn records_stay_in_their_slots() {
        let (store, mut fram) = setup();
        assert!(matches!(
            store.write(&mut fram, "last_game", &[0; 0x101]),
            Err(StoreError::TooLarge { capacity: 0x100, .. })
        ));
        assert!(matches!(
            store.write(&mut fram, "highscores", b"x"),
            Err(StoreError::UnknownRecord(_))
        ));
    }

    #[test]
    fn json_records() {
        let (store, mut fram) = setup();
        let value = serde_json::json!({"Initials": "AAA", "Score": 1_000_000});
        store.write_json(&mut fram, "tournament", &value).unwrap();
        let back: serde_json::Value = store.read_json(&mut fram, "tournament").unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn table_must_fit_region() {
        let region = Region::new("tiny", 0x100, 0x20);
        assert!(matches!(
            DataStore::new(region, &[("a", 0x10), ("b", 0x10)]),
            Err(LayoutError::TooSmall { needed: 0x28, .. })
        ));
    }
}
