//! Time Window Gate
//! Mission: Allow attendance writes only inside a daily window
//!
//! The window is evaluated against the wall clock on every call, in a fixed
//! civil offset. Bounds are inclusive and compared at whole-second
//! precision. A start after the end means the window spans midnight.

use chrono::{DateTime, FixedOffset, NaiveTime, Timelike, Utc};

use super::AccessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceWindow {
    start: NaiveTime,
    end: NaiveTime,
    offset: FixedOffset,
}

impl AttendanceWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, offset: FixedOffset) -> Self {
        Self { start, end, offset }
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local time of day for `now`, sub-second part dropped
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveTime {
        let local = now.with_timezone(&self.offset).time();
        local.with_nanosecond(0).unwrap_or(local)
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let t = self.local_time(now);
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }

    pub fn check_within_window(&self, now: DateTime<Utc>) -> Result<(), AccessError> {
        if self.contains(now) {
            Ok(())
        } else {
            Err(AccessError::OutsideAllowedWindow {
                start: self.start,
                end: self.end,
            })
        }
    }
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S").or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
}
