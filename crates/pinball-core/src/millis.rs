//! Monotonic timestamps.

/// A monotonic timestamp in milliseconds since boot.
///
/// The scheduler owns the clock and hands the current `Millis` to every
/// periodic callback. Subtraction saturates at zero so a stale timestamp
/// can never produce a huge elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(ms: u64) -> Self {
        Self(ms)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self` (zero if `earlier` is later).
    #[must_use]
    pub const fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Timestamp as fractional seconds.
    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl core::ops::Add<u64> for Millis {
    type Output = Self;

    fn add(self, rhs: u64) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

impl core::ops::Sub for Millis {
    type Output = u64;

    fn sub(self, rhs: Self) -> u64 {
        self.since(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_saturates() {
        assert_eq!(Millis(100).since(Millis(40)), 60);
        assert_eq!(Millis(40).since(Millis(100)), 0);
        assert_eq!(Millis(40) - Millis(100), 0);
    }

    #[test]
    fn seconds() {
        assert!((Millis(1500).as_secs_f64() - 1.5).abs() < f64::EPSILON);
    }
}
