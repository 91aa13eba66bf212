//! Timestamp watermark checkpoint.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Watermark used when the destination holds no rows for an entity yet.
///
/// A fixed historical date rather than "now": starting from the current time
/// would silently skip all pre-existing source history.
pub const DEFAULT_EPOCH_RFC3339: &str = "2000-01-01T00:00:00Z";

const DEFAULT_EPOCH_UNIX_SECONDS: i64 = 946_684_800;

/// Highest source-side modification timestamp reflected in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }

    /// The built-in default epoch, [`DEFAULT_EPOCH_RFC3339`].
    pub fn default_epoch() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(DEFAULT_EPOCH_UNIX_SECONDS))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// Lower bound for extraction: the watermark minus the safety margin.
    ///
    /// Saturates at the earliest representable instant.
    pub fn start_boundary(&self, safety_margin: Duration) -> DateTime<Utc> {
        self.0
            .checked_sub_signed(safety_margin)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Parse a timestamp given on the command line or in a config file.
    ///
    /// Accepts RFC 3339, or a naive `YYYY-MM-DD[THH:MM:SS[.f]]` read as UTC.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self(naive.and_utc()));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self(naive.and_utc()));
            }
        }
        Err(anyhow::anyhow!(
            "Invalid watermark timestamp '{s}': expected RFC 3339 or YYYY-MM-DDTHH:MM:SS"
        ))
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl crate::Checkpoint for Watermark {
    const CHECKPOINT_TYPE: &'static str = "watermark";

    fn to_cli_string(&self) -> String {
        self.to_string()
    }

    fn from_cli_string(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
