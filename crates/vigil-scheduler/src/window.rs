//! Allowed-window evaluation for periodic jobs.
//!
//! A [`TimeWindow`] is pure and stateless: given an instant it converts to
//! the configured IANA timezone, extracts weekday and hour, and evaluates
//! the predicate. Callers inject `now`, so boundary behavior is testable
//! without a clock.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Half-open local-hour range.
///
/// `start == end` covers the whole day. `start > end` wraps past midnight:
/// a 9-2 range allows hours `9..24` and `0..2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourRange {
    start: u32,
    end: u32,
}

impl HourRange {
    pub fn new(start: u32, end: u32) -> Result<Self, ConfigError> {
        if start >= 24 || end >= 24 {
            return Err(ConfigError::InvalidHours(format!("{start}-{end}")));
        }
        Ok(Self { start, end })
    }

    /// The full 24-hour day.
    pub fn all_day() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            (self.start..self.end).contains(&hour)
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

impl FromStr for HourRange {
    type Err = ConfigError;

    /// Parse `"9-17"`, `"9-2"` (wrapping), or `"always"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("always") {
            return Ok(Self::all_day());
        }
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| ConfigError::InvalidHours(s.to_string()))?;
        let start: u32 = start
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHours(s.to_string()))?;
        let end: u32 = end
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHours(s.to_string()))?;
        Self::new(start, end)
    }
}

/// Which days of the week a job may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayRule {
    #[default]
    EveryDay,
    /// Monday through Friday only.
    Weekdays,
}

impl DayRule {
    fn allows(&self, weekday: Weekday) -> bool {
        match self {
            DayRule::EveryDay => true,
            DayRule::Weekdays => !matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

/// The allowed time window for a job, in a fixed reference timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    timezone: Tz,
    hours: HourRange,
    days: DayRule,
}

impl TimeWindow {
    /// Build a window from an IANA zone id.
    pub fn new(timezone: &str, hours: HourRange, days: DayRule) -> Result<Self, ConfigError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(timezone.to_string()))?;
        Ok(Self {
            timezone: tz,
            hours,
            days,
        })
    }

    /// A window that allows every instant.
    pub fn always() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            hours: HourRange::all_day(),
            days: DayRule::EveryDay,
        }
    }

    /// Whether a job gated by this window may run at `now`.
    pub fn allows(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        self.days.allows(local.weekday()) && self.hours.contains(local.hour())
    }
}
