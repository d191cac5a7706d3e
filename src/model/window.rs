use chrono::{DateTime, Duration, Utc};

use crate::error::CollectError;

/// Half-open millisecond interval `[start_ms, end_ms)`. Always non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start_ms: i64,
    end_ms: i64,
}

impl TimeWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self, CollectError> {
        if start_ms >= end_ms {
            return Err(CollectError::InvalidWindow { start_ms, end_ms });
        }
        Ok(TimeWindow { start_ms, end_ms })
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CollectError> {
        Self::new(start.timestamp_millis(), end.timestamp_millis())
    }

    /// `[start, start + 1 day)`.
    pub fn day_starting(start: DateTime<Utc>) -> Self {
        let start_ms = start.timestamp_millis();
        TimeWindow {
            start_ms,
            end_ms: start_ms + Duration::days(1).num_milliseconds(),
        }
    }

    /// `[now - days, now)`.
    pub fn trailing(now: DateTime<Utc>, days: u32) -> Result<Self, CollectError> {
        Self::between(now - Duration::days(i64::from(days)), now)
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    pub fn contains(&self, ts_ms: i64) -> bool {
        ts_ms >= self.start_ms && ts_ms < self.end_ms
    }
}
