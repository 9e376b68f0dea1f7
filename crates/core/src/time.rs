use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Result, TracelensError};

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| TracelensError::Parse(format!("invalid duration {input}: {e}")))
}

/// Whole milliseconds from `start` to `end`; negative if `end` is earlier.
pub fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds()
}

/// True when `[from, to)` is shorter than `min`. Reversed windows count as
/// too short.
pub fn window_shorter_than(from: DateTime<Utc>, to: DateTime<Utc>, min: Duration) -> bool {
    match (to - from).to_std() {
        Ok(len) => len < min,
        Err(_) => true,
    }
}
