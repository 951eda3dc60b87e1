//! Dispatch window definitions and target time resolution.
//!
//! A campaign schedule is a list of [`Window`]s, each pairing a local
//! time of day with a capacity (how many recipients that window may
//! dispatch). Windows are processed in configured order within a single
//! calendar day.

use chrono::{DateTime, Days, Duration, Local, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

/// A local wall-clock time in `HH:MM` form (24-hour).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

/// Error parsing a `HH:MM` time-of-day string.
#[derive(Debug, thiserror::Error)]
#[error("invalid time of day (expected HH:MM): {0:?}")]
pub struct ParseTimeOfDayError(String);

impl TimeOfDay {
    /// Build from components. Returns `None` if out of range.
    #[must_use]
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Hour of day (0-23).
    #[must_use]
    pub fn hour(self) -> u8 {
        self.hour
    }

    /// Minute of hour (0-59).
    #[must_use]
    pub fn minute(self) -> u8 {
        self.minute
    }

    /// The next instant with this wall-clock time, at minute granularity:
    /// today if the time has not yet passed (a window whose minute is the
    /// current minute fires now), otherwise tomorrow.
    #[must_use]
    pub fn next_occurrence(self, now: DateTime<Local>) -> DateTime<Local> {
        // hour/minute are range-checked at construction.
        let time =
            NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
                .unwrap_or_default();
        let passed = (u32::from(self.hour), u32::from(self.minute)) < (now.hour(), now.minute());
        let date = if passed {
            now.date_naive() + Days::new(1)
        } else {
            now.date_naive()
        };
        let naive = date.and_time(time);

        // A wall-clock time inside a DST spring-forward gap does not
        // exist; slide it one hour later.
        now.timezone()
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                now.timezone()
                    .from_local_datetime(&(naive + Duration::hours(1)))
                    .earliest()
            })
            .unwrap_or(now)
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = ParseTimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeOfDayError(s.to_owned());
        let (h, m) = s.split_once(':').ok_or_else(err)?;
        let hour: u8 = h.trim().parse().map_err(|_| err())?;
        let minute: u8 = m.trim().parse().map_err(|_| err())?;
        Self::new(hour, minute).ok_or_else(err)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

/// One dispatch window: a local send time and a recipient capacity.
///
/// A capacity of zero is legal; the window selects nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Local time of day the window opens, `"HH:MM"`.
    pub send_at: TimeOfDay,
    /// Maximum number of recipients dispatched in this window.
    pub capacity: usize,
}

impl Window {
    /// Resolve the instant this window targets, relative to `now`.
    ///
    /// Resolved once when the window is reached, not re-resolved while
    /// waiting.
    #[must_use]
    pub fn target_instant(&self, now: DateTime<Local>) -> DateTime<Local> {
        self.send_at.next_occurrence(now)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
