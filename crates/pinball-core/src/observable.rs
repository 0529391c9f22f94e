//! Diagnostic state queries.
//!
//! Every long-lived component (game-state engine, debounce filter, writeback)
//! can be inspected by path from a diagnostics page. Queries never change
//! state.

use std::fmt;

/// A dynamically-typed value returned by a state query.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Flag.
    Bool(bool),
    /// Byte (shadow memory cell, ball number).
    U8(u8),
    /// 16-bit word (NV address, checksum).
    U16(u16),
    /// 32-bit word (sensor mask, score).
    U32(u32),
    /// 64-bit counter (timestamp in milliseconds).
    U64(u64),
    /// Fractional value (seconds).
    F64(f64),
    /// Text.
    String(String),
    /// Absent optional (e.g., a game that has not ended).
    None,
    /// Array of values.
    Array(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U32(v) => write!(f, "{v:#010X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v:.3}"),
            Value::String(v) => write!(f, "{v}"),
            Value::None => write!(f, "-"),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

/// A component whose state can be inspected.
pub trait Observable {
    /// Query a property by path.
    ///
    /// Paths are flat or dotted:
    /// - `poll_state` - game-state machine phase
    /// - `score.0` - first player's score
    ///
    /// Returns `None` if the path is not recognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// List the paths `query()` understands.
    fn query_paths(&self) -> &'static [&'static str];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_by_width() {
        assert_eq!(Value::U8(0xF1).to_string(), "0xF1");
        assert_eq!(Value::U16(0x2600).to_string(), "0x2600");
        assert_eq!(Value::from(None::<u64>).to_string(), "-");
        assert_eq!(
            Value::Array(vec![Value::U8(1), Value::Bool(true)]).to_string(),
            "[0x01, true]"
        );
    }
}
