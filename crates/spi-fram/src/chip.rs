//! Behavioural model of an SPI FRAM part.
//!
//! Used by tests and by host-side simulation in place of the real chip.
//! Each call to `transaction` is one chip-select low..high window.
//!
//! Behaviour that matters to the driver:
//!   - WRITE is ignored unless the write enable latch (WEL) is set.
//!   - WEL clears when chip select rises after a WRITE frame.
//!   - Addresses wrap at the device size (the part ignores upper bits).

use crate::device::SpiDevice;
use crate::{OP_RDSR, OP_READ, OP_WRDI, OP_WREN, OP_WRITE, STATUS_WEL};

/// Fault injected by [`FramChip::fail_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("injected SPI fault on transaction {0}")]
pub struct ChipFault(pub usize);

/// In-memory FRAM part.
pub struct FramChip {
    data: Vec<u8>,
    write_enabled: bool,
    /// Transactions seen so far.
    transactions: usize,
    /// Transaction number (1-based) that should fail.
    fail_at: Option<usize>,
    /// First byte of every transaction, in order.
    opcodes: Vec<u8>,
}

impl FramChip {
    /// A blank part of `size` bytes. FRAM ships zeroed.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not a power of two.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size.is_power_of_two(), "FRAM size must be a power of two");
        Self {
            data: vec![0; size],
            write_enabled: false,
            transactions: 0,
            fail_at: None,
            opcodes: Vec::new(),
        }
    }

    fn mask(&self) -> usize {
        self.data.len() - 1
    }

    /// Make the `n`th transaction from now fail (1 = the next one).
    pub fn fail_at(&mut self, n: usize) {
        self.fail_at = Some(self.transactions + n);
    }

    /// Read a byte without going through the bus.
    #[must_use]
    pub fn peek(&self, address: usize) -> u8 {
        self.data[address & self.mask()]
    }

    /// Whole device contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Preload contents (e.g. a saved image).
    pub fn load_bytes(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(self.data.len());
        self.data[..len].copy_from_slice(&bytes[..len]);
    }

    /// Opcodes of every transaction so far.
    #[must_use]
    pub fn opcode_log(&self) -> &[u8] {
        &self.opcodes
    }

    fn address(&self, tx: &[u8]) -> usize {
        let hi = tx.get(1).copied().unwrap_or(0);
        let lo = tx.get(2).copied().unwrap_or(0);
        usize::from(u16::from_be_bytes([hi, lo])) & self.mask()
    }
}

impl SpiDevice for FramChip {
    type Error = ChipFault;

    fn transaction(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), ChipFault> {
        self.transactions += 1;
        let Some(&opcode) = tx.first() else {
            return Ok(());
        };
        self.opcodes.push(opcode);
        if self.fail_at == Some(self.transactions) {
            self.fail_at = None;
            return Err(ChipFault(self.transactions));
        }

        match opcode {
            OP_WREN => self.write_enabled = true,
            OP_WRDI => self.write_enabled = false,
            OP_RDSR => {
                if let Some(status) = rx.first_mut() {
                    *status = if self.write_enabled { STATUS_WEL } else { 0 };
                }
            }
            OP_WRITE => {
                if self.write_enabled && tx.len() > 3 {
                    let mut addr = self.address(tx);
                    for &byte in &tx[3..] {
                        self.data[addr] = byte;
                        addr = (addr + 1) & self.mask();
                    }
                }
                // CS rising edge after WRITE clears the latch.
                self.write_enabled = false;
            }
            OP_READ => {
                let mut addr = self.address(tx);
                for byte in rx.iter_mut() {
                    *byte = self.data[addr];
                    addr = (addr + 1) & self.mask();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
