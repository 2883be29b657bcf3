//! Time source and simulated I/O latency.
//!
//! The driver never calls `Utc::now()` or `thread::sleep` directly; it goes
//! through a [`Clock`] so tests can drive uptime and latency by hand.

use chrono::{DateTime, TimeDelta, Utc};
use std::{
    fmt,
    sync::{Mutex, PoisonError},
    thread,
    time::Duration,
};

/// Wall clock plus a way to block the calling context for a while.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    /// Blocks the caller for `duration`. Never called while the access guard
    /// is held.
    fn sleep(&self, duration: Duration);
}

/// Real time, real sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Deterministic clock: time only moves when told to, and `sleep` advances
/// it instantly.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    slept: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start), slept: Mutex::new(Duration::ZERO) }
    }

    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    /// Sum of every `sleep` request served so far.
    pub fn total_slept(&self) -> Duration {
        *self.slept.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_now()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, duration: Duration) {
        *self.slept.lock().unwrap_or_else(PoisonError::into_inner) += duration;
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_asked() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - start, TimeDelta::seconds(5));
    }

    #[test]
    fn manual_sleep_advances_time_and_records_it() {
        let start = Utc::now();
        let clock = ManualClock::new(start);

        clock.sleep(Duration::from_millis(250));
        clock.sleep(Duration::from_millis(750));

        assert_eq!(clock.total_slept(), Duration::from_secs(1));
        assert_eq!(clock.now() - start, TimeDelta::seconds(1));
    }
}
