//! Packed BCD score fields.

/// Decode packed BCD, most significant byte first.
///
/// Each byte holds two digits. A nibble above 9 (the CPU was mid-write when
/// we looked) counts as 0.
#[must_use]
pub fn decode_bcd(bytes: &[u8]) -> u64 {
    let digit = |nibble: u8| if nibble > 9 { 0 } else { u64::from(nibble) };
    bytes.iter().fold(0u64, |acc, &b| {
        acc.wrapping_mul(100)
            .wrapping_add(digit(b >> 4) * 10 + digit(b & 0x0F))
    })
}
