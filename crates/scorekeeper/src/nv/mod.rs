//! Non-volatile address space.
//!
//! The FRAM is split into fixed regions, the same for every title of a
//! family:
//!
//! | Region       | Start   | Length        | Holds                          |
//! |--------------|---------|---------------|--------------------------------|
//! | Shadow image | $0000   | shadow length | persisted shadow memory        |
//! | Adjustments  | $2000   | $600          | 4 × $140 profiles + name table |
//! | Logger       | $2600   | $1FFF         | text log ring                  |
//! | Data store   | $4A67   | $3598         | named records                  |
//!
//! Regions never overlap, so a torn write in one can't damage another.

mod adjustments;
mod data_store;
mod log_ring;

pub use adjustments::{AdjustmentProfiles, PROFILE_NAME_LEN, PROFILE_SIZE, PROFILE_SLOTS};
pub use data_store::{DataStore, RECORD_OVERHEAD, StoreError};
pub use log_ring::NvLog;

use spi_fram::SHADOW_IMAGE_BASE;

/// A named span of device addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub start: u16,
    pub len: u16,
}

impl Region {
    #[must_use]
    pub const fn new(name: &'static str, start: u16, len: u16) -> Self {
        Self { name, start, len }
    }

    /// One past the last address.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start as usize + self.len as usize
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Region) -> bool {
        self.len != 0
            && other.len != 0
            && (self.start as usize) < other.end()
            && (other.start as usize) < self.end()
    }
}

/// Rejected region layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("{a} overlaps {b}")]
    Overlap { a: &'static str, b: &'static str },
    #[error("{region} ends at {end:#06X}, device holds {size:#06X} bytes")]
    OutOfDevice {
        region: &'static str,
        end: usize,
        size: usize,
    },
    #[error("{region} is {len:#06X} bytes, needs {needed:#06X}")]
    TooSmall {
        region: &'static str,
        len: usize,
        needed: usize,
    },
}

pub const ADJUSTMENTS_START: u16 = 0x2000;
pub const ADJUSTMENTS_LEN: u16 = 0x0600;
pub const LOGGER_START: u16 = 0x2600;
pub const LOGGER_LEN: u16 = 0x1FFF;
pub const DATA_STORE_START: u16 = 0x4A67;
pub const DATA_STORE_LEN: u16 = 0x3598;

/// Validated region map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvLayout {
    pub shadow_image: Region,
    pub adjustments: Region,
    pub logger: Region,
    pub data_store: Region,
}

impl NvLayout {
    /// Standard layout for a shadow memory of `shadow_len` bytes on a device
    /// of `device_size` bytes.
    pub fn standard(shadow_len: usize, device_size: usize) -> Result<Self, LayoutError> {
        let shadow_len = u16::try_from(shadow_len).map_err(|_| LayoutError::OutOfDevice {
            region: "shadow image",
            end: shadow_len,
            size: device_size,
        })?;
        Self::new(
            Region::new("shadow image", SHADOW_IMAGE_BASE, shadow_len),
            Region::new("adjustments", ADJUSTMENTS_START, ADJUSTMENTS_LEN),
            Region::new("logger", LOGGER_START, LOGGER_LEN),
            Region::new("data store", DATA_STORE_START, DATA_STORE_LEN),
            device_size,
        )
    }

    /// Check that the regions fit the device and are pairwise disjoint.
    pub fn new(
        shadow_image: Region,
        adjustments: Region,
        logger: Region,
        data_store: Region,
        device_size: usize,
    ) -> Result<Self, LayoutError> {
        let layout = Self {
            shadow_image,
            adjustments,
            logger,
            data_store,
        };
        let regions = layout.regions();
        for (i, region) in regions.iter().enumerate() {
            if region.end() > device_size {
                return Err(LayoutError::OutOfDevice {
                    region: region.name,
                    end: region.end(),
                    size: device_size,
                });
            }
            for other in &regions[i + 1..] {
                if region.overlaps(other) {
                    return Err(LayoutError::Overlap {
                        a: region.name,
                        b: other.name,
                    });
                }
            }
        }
        Ok(layout)
    }

    #[must_use]
    pub const fn regions(&self) -> [Region; 4] {
        [
            self.shadow_image,
            self.adjustments,
            self.logger,
            self.data_store,
        ]
    }
}
