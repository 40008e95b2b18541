/*
SPDX-FileCopyrightText: Copyright 2025 vatlapse contributors
SPDX-License-Identifier: MIT
*/

//! Clock abstraction for the capture scheduler.
//!
//! The scheduler never calls `Instant::now()` or `thread::sleep()` directly;
//! it goes through [`MonotonicClock`].  Production uses the thin
//! [`SystemClock`], tests use [`ManualClock`] so a multi-hour schedule runs in
//! microseconds and deadline arithmetic can be asserted exactly.

use std::time::{Duration, Instant};

/// Monotonic time source plus blocking sleep.
///
/// `now()` must never go backwards and must be unaffected by wall-clock
/// adjustments.  `sleep(d)` blocks the calling thread for at least `d`.
pub trait MonotonicClock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// The real thing: `Instant::now()` and `thread::sleep()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl MonotonicClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ── Test clock ────────────────────────────────────────────────────────────────

/// Deterministic clock for tests: `sleep(d)` advances simulated time by
/// exactly `d` and returns immediately, and [`advance`](Self::advance) models
/// time passing outside of sleeps (a slow capture, a late start).
///
/// Interior mutability keeps the [`MonotonicClock`] methods `&self`, matching
/// the production impl.  Not `Sync`; the scheduler runs on a single thread.
#[cfg(test)]
pub struct ManualClock {
    base: Instant,
    offset: std::cell::Cell<Duration>,
    sleeps: std::cell::RefCell<Vec<Duration>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: std::cell::Cell::new(Duration::ZERO),
            sleeps: std::cell::RefCell::new(Vec::new()),
        }
    }

    /// Simulated time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    /// Move time forward without a sleep call.
    pub fn advance(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }

    /// Every sleep the scheduler requested, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

#[cfg(test)]
impl MonotonicClock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_by_exactly_the_slept_duration() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.sleep(Duration::from_millis(250));
        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.now() - t0, Duration::from_millis(500));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn advance_is_not_recorded_as_a_sleep() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(3));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn system_clock_now_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
