//! Display message injection.
//!
//! Some ROMs show a custom message (attract-mode text) from a RAM buffer.
//! We overwrite that buffer in shadow memory, then fix its checksum in the
//! same call so the ROM accepts it.

use shadow_memory::ShadowMemory;

use crate::checksum::ChecksumMaintainer;
use crate::map::DisplayMessage;

/// Rejected message writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("title has no display message buffer")]
    Unsupported,
    #[error("{given} lines given, title has {available}")]
    TooManyLines { given: usize, available: usize },
}

/// Display-safe byte: printable ASCII upper-cased, anything else a space.
fn display_byte(c: char) -> u8 {
    if c.is_ascii_graphic() || c == ' ' {
        c.to_ascii_uppercase() as u8
    } else {
        b' '
    }
}

/// Write `lines` into the title's message buffers.
///
/// Each line is upper-cased, padded with spaces or truncated to the buffer
/// length. Configured lines beyond `lines.len()` are blanked. Every
/// checksum the maintainer knows about is fixed before returning.
pub fn write_message(
    shadow: &ShadowMemory,
    message: &DisplayMessage,
    maintainer: &ChecksumMaintainer,
    lines: &[&str],
) -> Result<(), MessageError> {
    if lines.len() > message.lines.len() {
        return Err(MessageError::TooManyLines {
            given: lines.len(),
            available: message.lines.len(),
        });
    }

    for (i, span) in message.lines.iter().enumerate() {
        let text = lines.get(i).copied().unwrap_or("");
        let mut buf = vec![b' '; span.len()];
        for (dst, c) in buf.iter_mut().zip(text.chars()) {
            *dst = display_byte(c);
        }
        maintainer.write(shadow, span.offset(), &buf);
    }
    log::debug!("display message written ({} lines)", lines.len());
    Ok(())
}
