//! Quiescence debouncer: fire once the page has been quiet for `window`.
//!
//! An optional `max_wait` also fires once a burst has lasted that long. A
//! forced pass can land mid-stream, so it is only safe when the platform's
//! streaming marker reliably matches; it is off unless configured.
//!
//! Time is passed in explicitly so the caller (and tests) own the clock.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Quiescence {
    window: Duration,
    max_wait: Option<Duration>,
    first: Option<Instant>,
    last: Option<Instant>,
}

impl Quiescence {
    pub fn new(window: Duration, max_wait: Option<Duration>) -> Self {
        Self {
            window,
            max_wait: max_wait.map(|m| m.max(window)),
            first: None,
            last: None,
        }
    }

    pub fn note_mutation(&mut self, now: Instant) {
        self.first.get_or_insert(now);
        self.last = Some(now);
    }

    /// A mutation is waiting to be processed.
    pub fn is_pending(&self) -> bool {
        self.last.is_some()
    }

    pub fn is_quiet(&self, now: Instant) -> bool {
        self.last
            .is_some_and(|last| now.saturating_duration_since(last) >= self.window)
    }

    fn burst_expired(&self, now: Instant) -> bool {
        match (self.first, self.max_wait) {
            (Some(first), Some(max_wait)) => now.saturating_duration_since(first) >= max_wait,
            _ => false,
        }
    }

    /// When the pending trigger becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        let quiet_at = self.last? + self.window;
        match (self.first, self.max_wait) {
            (Some(first), Some(max_wait)) => Some(quiet_at.min(first + max_wait)),
            _ => Some(quiet_at),
        }
    }

    /// Consume the pending trigger if it is due.
    pub fn take_trigger(&mut self, now: Instant) -> bool {
        if self.is_pending() && (self.is_quiet(now) || self.burst_expired(now)) {
            self.first = None;
            self.last = None;
            true
        } else {
            false
        }
    }
}

impl Default for Quiescence {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500), None)
    }
}
