//! FRAM driver errors.

/// Errors surfaced by the FRAM driver.
///
/// The driver never retries; the scheduler decides whether to try again on
/// its next writeback period.
#[derive(Debug, thiserror::Error)]
pub enum FramError {
    /// A transaction on the SPI bus failed.
    #[error("SPI transfer failed at {address:#06X}")]
    Bus {
        address: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The request runs past the end of the device.
    #[error("{len} bytes at {address:#06X} exceed device size {size:#06X}")]
    OutOfRange { address: usize, len: usize, size: usize },
}
