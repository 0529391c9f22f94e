//! Trait for components driven by the periodic scheduler.

use crate::Millis;

/// A component advanced by the scheduler on a fixed period.
///
/// The scheduler is cooperative: `poll` must not block or wait. It runs to
/// completion and returns, leaving any follow-up work for the next call.
pub trait Periodic {
    /// Advance the component to `now`.
    fn poll(&mut self, now: Millis);
}
