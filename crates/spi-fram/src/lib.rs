//! Serial FRAM (MB85RS256-class) non-volatile store.
//!
//! The FRAM hangs off an SPI bus: every command is one chip-select framed
//! transaction. The device clears its write-enable latch at the end of every
//! write, so the driver re-arms it (WREN) before each write frame.
//!
//! # Commands
//!
//! | Opcode | Name  | Frame                              |
//! |--------|-------|------------------------------------|
//! | $06    | WREN  | `06`                               |
//! | $04    | WRDI  | `04`                               |
//! | $05    | RDSR  | `05` → status                      |
//! | $02    | WRITE | `02 addr_hi addr_lo data...`       |
//! | $03    | READ  | `03 addr_hi addr_lo` → data...     |
//!
//! All payloads are moved in chunks of at most [`CHUNK_SIZE`] bytes so no
//! single transaction holds the bus longer than a poll period allows.

mod chip;
mod device;
mod error;
mod fram;
mod writeback;

pub use chip::{ChipFault, FramChip};
pub use device::SpiDevice;
pub use error::FramError;
pub use fram::{CHUNK_SIZE, Fram, MAX_DEVICE_SIZE, SHADOW_IMAGE_BASE};
pub use writeback::Writeback;

/// Write enable latch set.
pub const OP_WREN: u8 = 0x06;
/// Write enable latch reset.
pub const OP_WRDI: u8 = 0x04;
/// Read status register.
pub const OP_RDSR: u8 = 0x05;
/// Write memory.
pub const OP_WRITE: u8 = 0x02;
/// Read memory.
pub const OP_READ: u8 = 0x03;

/// Status register: write enable latch.
pub const STATUS_WEL: u8 = 0x02;

/// 256 Kbit part: 32 KiB, 15-bit addresses.
pub const DEVICE_SIZE: usize = 0x8000;
