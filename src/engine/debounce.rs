//! Quiet-period debouncing for mutation signals.

use std::time::Duration;
use tokio::time::Instant;

/// Collapses a burst of signals into one due time: `quiet` after the last
/// signal. Every new signal pushes the deadline back.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    last_signal: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_signal: None,
        }
    }

    pub fn signal(&mut self, now: Instant) {
        self.last_signal = Some(now);
    }

    /// When the pending burst becomes due, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_signal.map(|at| at + self.quiet)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.last_signal.is_some()
    }

    pub fn clear(&mut self) {
        self.last_signal = None;
    }
}
