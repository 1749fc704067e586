//! Debounce and throttle gates driven by caller-supplied clocks.
//!
//! Neither gate owns a timer thread. The host loop passes `Instant`s in and
//! polls, which keeps the gates deterministic under test and usable from any
//! single-threaded event loop.
//!
//! [`Debouncer`] compares values by their [`stable_stringify`] fingerprint, so
//! re-observing a structurally equal value (even with different key order)
//! does not restart the quiet interval.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::canonical::stable_stringify;

/// Emits a value once it has stopped changing for `interval`.
///
/// At most one settle is pending at a time; a new change replaces the pending
/// value and restarts the interval.
#[derive(Debug, Clone)]
pub struct Debouncer {
    interval: Duration,
    /// Fingerprint of the most recently observed value.
    current: Option<String>,
    /// When `current` was first observed, while a settle is pending.
    changed_at: Option<Instant>,
    /// Fingerprint last returned by `poll`.
    settled: Option<String>,
}

impl Debouncer {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            current: None,
            changed_at: None,
            settled: None,
        }
    }

    /// Record the latest value. Returns `true` if it differs from the
    /// previously observed one (and the quiet interval restarted).
    pub fn observe<T: Serialize + ?Sized>(&mut self, value: &T, now: Instant) -> bool {
        let fingerprint = stable_stringify(value);
        if self.current.as_deref() == Some(fingerprint.as_str()) {
            return false;
        }
        self.current = Some(fingerprint);
        if self.current == self.settled {
            // Changed back to the last emitted value: nothing left to emit.
            self.changed_at = None;
        } else {
            self.changed_at = Some(now);
        }
        true
    }

    /// Return the settled fingerprint if the quiet interval has elapsed.
    ///
    /// Each settle is reported exactly once.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let changed_at = self.changed_at?;
        if now.saturating_duration_since(changed_at) < self.interval {
            return None;
        }
        self.changed_at = None;
        self.settled.clone_from(&self.current);
        self.current.clone()
    }

    /// Whether a change is waiting for its quiet interval.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.changed_at.is_some()
    }

    /// Drop any pending settle without emitting it.
    pub fn cancel(&mut self) {
        self.changed_at = None;
        self.current.clone_from(&self.settled);
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

/// Admits at most one event per `interval`.
#[derive(Debug, Clone)]
pub struct Throttler {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl Throttler {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    /// Returns `true` (and records `now`) if an event may fire.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_fired
            && now.saturating_duration_since(last) < self.interval
        {
            return false;
        }
        self.last_fired = Some(now);
        true
    }

    /// Time left before the next event is admitted.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.last_fired.map_or(Duration::ZERO, |last| {
            self.interval
                .saturating_sub(now.saturating_duration_since(last))
        })
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}
