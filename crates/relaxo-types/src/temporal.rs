use std::fmt;

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock instant recorded on commits.
///
/// Stored as whole seconds since the UNIX epoch plus the UTC offset of the
/// machine that produced it, so history can be shown in the author's local
/// time. Ordering is by instant first, offset second.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since the UNIX epoch (UTC).
    pub seconds: i64,
    /// Offset from UTC in minutes at the time of recording.
    pub offset_minutes: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    /// The current local time.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            seconds: now.timestamp(),
            offset_minutes: now.offset().local_minus_utc() / 60,
        }
    }

    /// The UNIX epoch in UTC.
    pub const fn epoch() -> Self {
        Self {
            seconds: 0,
            offset_minutes: 0,
        }
    }

    /// Convert to a `chrono` date-time in the recorded offset.
    ///
    /// Falls back to UTC when the stored offset is out of range.
    pub fn to_datetime(&self) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60).unwrap_or(Utc.fix());
        let utc = Utc
            .timestamp_opt(self.seconds, 0)
            .single()
            .unwrap_or_default();
        utc.with_timezone(&offset)
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seconds
            .cmp(&other.seconds)
            .then(self.offset_minutes.cmp(&other.offset_minutes))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}{:+})", self.seconds, self.offset_minutes)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%d %H:%M:%S %z"))
    }
}
