//! Timestamp conversion.
//!
//! The store keeps epoch milliseconds. Anything finer than a millisecond is
//! dropped on encode, so `from_millis(to_millis(t)) == t` only holds for
//! values that are already millisecond-aligned.

use crate::error::TranscodeError;
use chrono::{DateTime, Utc};

pub fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, TranscodeError> {
    DateTime::from_timestamp_millis(millis).ok_or(TranscodeError::TimestampOutOfRange(millis))
}
