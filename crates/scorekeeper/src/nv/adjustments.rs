//! Saved adjustment profiles.
//!
//! An operator can snapshot the game's adjustments (the ROM's checksummed
//! settings block) into one of a few named slots and put it back later, for
//! example to switch between home and tournament settings.
//!
//! ```text
//! start + n × $140          profile n data
//! start + 4 × $140 + n × 16 profile n name (NUL padded, empty = unused)
//! ```

use memory_map::MemoryMap;
use shadow_memory::ShadowMemory;
use spi_fram::{Fram, SpiDevice};

use super::{LayoutError, Region, StoreError};

/// Bytes per profile.
pub const PROFILE_SIZE: usize = 0x140;
/// Bytes per profile name.
pub const PROFILE_NAME_LEN: usize = 16;
/// Profiles in the adjustments region.
pub const PROFILE_SLOTS: usize = 4;

/// Profile slots in the adjustments region.
#[derive(Debug, Clone, Copy)]
pub struct AdjustmentProfiles {
    region: Region,
}

impl AdjustmentProfiles {
    pub fn new(region: Region) -> Result<Self, LayoutError> {
        let needed = PROFILE_SLOTS * (PROFILE_SIZE + PROFILE_NAME_LEN);
        if usize::from(region.len) < needed {
            return Err(LayoutError::TooSmall {
                region: region.name,
                len: usize::from(region.len),
                needed,
            });
        }
        Ok(Self { region })
    }

    fn check_slot(slot: usize) -> Result<(), StoreError> {
        if slot < PROFILE_SLOTS {
            Ok(())
        } else {
            Err(StoreError::NoSlot(slot))
        }
    }

    fn data_address(&self, slot: usize) -> u16 {
        self.region.start + (slot * PROFILE_SIZE) as u16
    }

    fn name_address(&self, slot: usize) -> u16 {
        self.region.start + (PROFILE_SLOTS * PROFILE_SIZE + slot * PROFILE_NAME_LEN) as u16
    }

    /// Copy the title's adjustments block from shadow memory into `slot`.
    ///
    /// The name is written last; a slot only counts as used once it has one.
    pub fn save<D: SpiDevice>(
        &self,
        fram: &mut Fram<D>,
        slot: usize,
        name: &str,
        shadow: &ShadowMemory,
        map: &MemoryMap,
    ) -> Result<(), StoreError> {
        Self::check_slot(slot)?;
        let range = map
            .adjustments
            .ok_or(StoreError::NoAdjustments)?
            .checksum
            .range();
        if range.len() > PROFILE_SIZE {
            return Err(StoreError::TooLarge {
                name: format!("profile {slot}"),
                len: range.len(),
                capacity: PROFILE_SIZE,
            });
        }

        fram.write(self.data_address(slot), &shadow.read_span(range))?;

        let mut stored = [0u8; PROFILE_NAME_LEN];
        let label = if name.trim().is_empty() {
            format!("PROFILE {}", slot + 1)
        } else {
            name.trim().to_string()
        };
        for (dst, b) in stored
            .iter_mut()
            .zip(label.bytes().filter(|b| b.is_ascii_graphic() || *b == b' '))
        {
            *dst = b;
        }
        fram.write(self.name_address(slot), &stored)?;
        log::info!("adjustments saved to profile {slot} ({label})");
        Ok(())
    }

    /// Write profile `slot` back into shadow memory and fix the checksum.
    pub fn restore<D: SpiDevice>(
        &self,
        fram: &mut Fram<D>,
        slot: usize,
        shadow: &ShadowMemory,
        map: &MemoryMap,
    ) -> Result<(), StoreError> {
        Self::check_slot(slot)?;
        let range = map
            .adjustments
            .ok_or(StoreError::NoAdjustments)?
            .checksum
            .range();
        if self.name(fram, slot)?.is_none() {
            return Err(StoreError::EmptySlot(slot));
        }
        if range.len() > PROFILE_SIZE {
            return Err(StoreError::TooLarge {
                name: format!("profile {slot}"),
                len: range.len(),
                capacity: PROFILE_SIZE,
            });
        }

        let mut data = vec![0u8; range.len()];
        fram.read(self.data_address(slot), &mut data)?;
        map.checksum_maintainer().write(shadow, range.offset(), &data);
        log::info!("adjustments restored from profile {slot}");
        Ok(())
    }

    /// Name of `slot`, `None` if unused.
    pub fn name<D: SpiDevice>(
        &self,
        fram: &mut Fram<D>,
        slot: usize,
    ) -> Result<Option<String>, StoreError> {
        Self::check_slot(slot)?;
        let mut stored = [0u8; PROFILE_NAME_LEN];
        fram.read(self.name_address(slot), &mut stored)?;
        let len = stored.iter().position(|&b| b == 0).unwrap_or(PROFILE_NAME_LEN);
        let name = &stored[..len];
        if name.is_empty() || name.iter().any(|b| !(b.is_ascii_graphic() || *b == b' ')) {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(name).into_owned()))
    }

    /// Names of every slot.
    pub fn names<D: SpiDevice>(&self, fram: &mut Fram<D>) -> Result<Vec<Option<String>>, StoreError> {
        (0..PROFILE_SLOTS).map(|slot| self.name(fram, slot)).collect()
    }

    /// Mark `slot` unused.
    pub fn delete<D: SpiDevice>(&self, fram: &mut Fram<D>, slot: usize) -> Result<(), StoreError> {
        Self::check_slot(slot)?;
        fram.write(self.name_address(slot), &[0u8; PROFILE_NAME_LEN])?;
        Ok(())
    }
}
