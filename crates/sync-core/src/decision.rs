//! Last-writer-wins conflict resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome for a single candidate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDecision {
    /// No destination row exists for this identity.
    Insert,
    /// A destination row exists and the candidate is strictly newer.
    Update,
    /// The destination already holds equal-or-fresher data.
    Skip,
    /// The candidate failed validation before identity resolution.
    Rejected,
}

impl SyncDecision {
    /// Whether this decision requires a destination write.
    pub fn writes(&self) -> bool {
        matches!(self, Self::Insert | Self::Update)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Skip => "skip",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SyncDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide what to do with a candidate modified at `candidate_modified_at`
/// given the destination's current timestamp for the same identity.
///
/// Ties favor the destination: a re-delivered record with an identical
/// timestamp carries no new information.
pub fn decide(
    candidate_modified_at: DateTime<Utc>,
    existing_modified_at: Option<DateTime<Utc>>,
) -> SyncDecision {
    match existing_modified_at {
        None => SyncDecision::Insert,
        Some(existing) if candidate_modified_at > existing => SyncDecision::Update,
        Some(_) => SyncDecision::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_absent_destination_row_inserts() {
        let t = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        assert_eq!(decide(t, None), SyncDecision::Insert);
    }

    #[test]
    fn test_last_writer_wins() {
        let t = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        let tick = Duration::seconds(1);

        assert_eq!(decide(t, Some(t)), SyncDecision::Skip);
        assert_eq!(decide(t + tick, Some(t)), SyncDecision::Update);
        assert_eq!(decide(t - tick, Some(t)), SyncDecision::Skip);
    }

    #[test]
    fn test_sub_second_difference_updates() {
        let t = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        assert_eq!(
            decide(t + Duration::microseconds(1), Some(t)),
            SyncDecision::Update
        );
    }

    #[test]
    fn test_only_insert_and_update_write() {
        assert!(SyncDecision::Insert.writes());
        assert!(SyncDecision::Update.writes());
        assert!(!SyncDecision::Skip.writes());
        assert!(!SyncDecision::Rejected.writes());
    }
}
