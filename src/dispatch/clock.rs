//! Injectable time source for the dispatch engine.
//!
//! The engine never calls `Local::now()` directly; it observes time
//! through a [`Clock`]. Production code uses [`SystemClock`]; tests use
//! [`ManualClock`] so waits resolve deterministically without real sleeps.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A controllable clock for tests.
///
/// Starts at a fixed instant. With a non-zero step, every observation
/// advances the clock by that step, so poll loops that repeatedly check
/// the time make progress without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Local>>,
    step: Duration,
}

impl ManualClock {
    /// A clock frozen at `start` until advanced explicitly.
    #[must_use]
    pub fn fixed(start: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start),
            step: Duration::zero(),
        }
    }

    /// A clock that advances by `step` on every [`Clock::now`] call.
    #[must_use]
    pub fn stepping(start: DateTime<Local>, step: Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        match self.current.lock() {
            Ok(mut current) => {
                let observed = *current;
                *current += self.step;
                observed
            }
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn fixed_clock_does_not_drift() {
        let start = Local.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        let clock = ManualClock::fixed(start);
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn advance_moves_fixed_clock() {
        let start = Local.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        let clock = ManualClock::fixed(start);
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), start + Duration::minutes(90));
    }

    #[test]
    fn stepping_clock_advances_per_observation() {
        let start = Local.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        let clock = ManualClock::stepping(start, Duration::seconds(30));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(60));
    }

    #[test]
    fn system_clock_is_roughly_now() {
        let before = Local::now();
        let observed = SystemClock.now();
        let after = Local::now();
        assert!(observed >= before && observed <= after);
    }
}
