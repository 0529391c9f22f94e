//! SPI transport interface.

/// Chip-select framed SPI transport.
///
/// The driver owns the device exclusively; nothing else may issue
/// transfers on the same chip select while it exists.
pub trait SpiDevice {
    /// Transport failure (bus stuck, DMA error, ...).
    type Error: std::error::Error + Send + Sync + 'static;

    /// One framed transaction: assert chip select, clock out `tx`, then
    /// clock in `rx.len()` bytes, then release chip select.
    ///
    /// Blocking. `rx` may be empty for write-only frames.
    fn transaction(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Self::Error>;
}
