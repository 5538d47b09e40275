//! # UTC Timestamps
//!
//! `Timestamp` is the block time carried in anchor proofs. It is always UTC
//! and truncated to whole seconds, so a proof canonicalizes to the same bytes
//! no matter which host built it.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimestampError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted; explicit
    /// offsets, `+00:00` included, are rejected.
    pub fn parse(s: &str) -> Result<Self, TimestampError> {
        if !s.ends_with('Z') {
            return Err(TimestampError::NotUtc(s.to_string()));
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| TimestampError::Invalid {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// From Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, TimestampError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or(TimestampError::OutOfRange(secs))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
