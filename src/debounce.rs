//! Trailing-edge debounce
//!
//! Bursts of edits collapse into one: every push restarts the window, and the latest value is
//! released once the window passes with no further pushes. Time is passed in by the caller so
//! the debouncer never sleeps or spawns anything.

use std::time::{Duration, Instant};

/// Default quiet period before an edited total is committed.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(750);

/// Holds the latest value until its window has elapsed.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl<T> Debouncer<T> {
    /// Create a debouncer with the given quiet period.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Quiet period
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replace any pending value and restart the window at `now`.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.window));
    }

    /// Release the pending value if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if now < self.deadline()? {
            return None;
        }

        self.cancel()
    }

    /// Value waiting to be released.
    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value)
    }

    /// When the pending value will be released.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Whether a value is waiting.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending value without releasing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}
