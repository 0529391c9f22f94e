//! Periodic deadlines.

use crate::Millis;

/// A fixed-period deadline for a scheduler slot.
///
/// Each slot (game-state poll, writeback, sensor sampling) runs at its own
/// period. `due` reports whether the slot should run now and, if so,
/// advances the deadline. Missed periods are not replayed: a late slot runs
/// once and the next deadline is measured from `now`.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    /// Period in milliseconds (e.g., `100` for the writeback slot).
    pub period_ms: u64,
    next: Millis,
}

impl Interval {
    /// A slot that first fires at `start`.
    #[must_use]
    pub const fn new(period_ms: u64, start: Millis) -> Self {
        Self {
            period_ms,
            next: start,
        }
    }

    /// Returns `true` and schedules the next deadline if `now` has reached it.
    pub fn due(&mut self, now: Millis) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.period_ms.max(1);
        true
    }

    /// Next deadline.
    #[must_use]
    pub const fn next(&self) -> Millis {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_period() {
        let mut slot = Interval::new(100, Millis(0));
        assert!(slot.due(Millis(0)));
        assert!(!slot.due(Millis(50)));
        assert!(!slot.due(Millis(99)));
        assert!(slot.due(Millis(100)));
        assert_eq!(slot.next(), Millis(200));
    }

    #[test]
    fn late_slot_does_not_replay() {
        let mut slot = Interval::new(100, Millis(0));
        assert!(slot.due(Millis(0)));
        assert!(slot.due(Millis(450)));
        assert!(!slot.due(Millis(500)));
        assert!(slot.due(Millis(550)));
    }

    #[test]
    fn zero_period_still_advances() {
        let mut slot = Interval::new(0, Millis(10));
        assert!(slot.due(Millis(10)));
        assert!(!slot.due(Millis(10)));
    }
}
