//! Unit tests for the checkpoint crate.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::time::Duration as StdDuration;
use sync_core::{EntityTag, ExternalIdentity, SyncError};
use sync_store::{MemoryDestination, ProjectedFields};

use crate::{Checkpoint, CheckpointTracker, Watermark, DEFAULT_EPOCH_RFC3339};

fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

// ============================================================================
// Watermark Tests
// ============================================================================

#[test]
fn test_default_epoch_matches_constant() {
    let epoch = Watermark::default_epoch();
    assert_eq!(epoch, Watermark::parse(DEFAULT_EPOCH_RFC3339).unwrap());
    assert_eq!(epoch.timestamp().year(), 2000);
}

#[test]
fn test_start_boundary_subtracts_margin() {
    let watermark = Watermark::new(ts(2025, 9, 1));
    assert_eq!(watermark.start_boundary(Duration::days(1)), ts(2025, 8, 31));
}

#[test]
fn test_start_boundary_saturates() {
    let watermark = Watermark::new(DateTime::<Utc>::MIN_UTC);
    assert_eq!(
        watermark.start_boundary(Duration::days(1)),
        DateTime::<Utc>::MIN_UTC
    );
}

#[test]
fn test_watermark_cli_string_roundtrip() {
    let original = Watermark::new(
        Utc.with_ymd_and_hms(2024, 6, 15, 14, 30, 0).unwrap() + Duration::microseconds(250),
    );
    let decoded = Watermark::from_cli_string(&original.to_cli_string()).unwrap();
    assert_eq!(original, decoded);
}

#[test]
fn test_watermark_parses_naive_forms_as_utc() {
    let w = Watermark::from_cli_string("2025-09-01T00:00:00").unwrap();
    assert_eq!(w.timestamp(), ts(2025, 9, 1));

    let w = Watermark::from_cli_string("2025-09-01").unwrap();
    assert_eq!(w.timestamp(), ts(2025, 9, 1));

    let w = Watermark::from_cli_string("2025-09-01T02:00:00+02:00").unwrap();
    assert_eq!(w.timestamp().hour(), 0);
}

#[test]
fn test_watermark_invalid_timestamp() {
    assert!(Watermark::from_cli_string("not-a-timestamp").is_err());
}

#[test]
fn test_watermark_checkpoint_type() {
    assert_eq!(Watermark::CHECKPOINT_TYPE, "watermark");
}

// ============================================================================
// CheckpointTracker Tests
// ============================================================================

#[tokio::test]
async fn test_tracker_uses_default_epoch_when_empty() {
    let dest = MemoryDestination::new();
    let tracker = CheckpointTracker::new(&dest, EntityTag::new("activity").unwrap());

    assert_eq!(tracker.last_synced().await.unwrap(), None);
    assert_eq!(
        tracker.current_watermark().await.unwrap(),
        Watermark::default_epoch()
    );
}

#[tokio::test]
async fn test_tracker_configured_default_epoch() {
    let dest = MemoryDestination::new();
    let epoch = Watermark::new(ts(2019, 1, 1));
    let tracker =
        CheckpointTracker::new(&dest, EntityTag::new("activity").unwrap()).with_default_epoch(epoch);
    assert_eq!(tracker.current_watermark().await.unwrap(), epoch);
}

#[tokio::test]
async fn test_tracker_reads_max_for_its_tag_only() {
    let dest = MemoryDestination::new();
    let activity = EntityTag::new("activity").unwrap();
    let ticket = EntityTag::new("ticket").unwrap();
    dest.seed(
        &activity,
        &ExternalIdentity::from_stored("activity|1"),
        ProjectedFields::new(),
        ts(2025, 8, 1),
    );
    dest.seed(
        &activity,
        &ExternalIdentity::from_stored("activity|2"),
        ProjectedFields::new(),
        ts(2025, 9, 1),
    );
    dest.seed(
        &ticket,
        &ExternalIdentity::from_stored("ticket|1"),
        ProjectedFields::new(),
        ts(2026, 1, 1),
    );

    let tracker = CheckpointTracker::new(&dest, activity);
    assert_eq!(
        tracker.current_watermark().await.unwrap(),
        Watermark::new(ts(2025, 9, 1))
    );
}

#[tokio::test]
async fn test_tracker_is_idempotent() {
    let dest = MemoryDestination::new();
    let tag = EntityTag::new("activity").unwrap();
    dest.seed(
        &tag,
        &ExternalIdentity::from_stored("activity|1"),
        ProjectedFields::new(),
        ts(2025, 8, 1),
    );
    let tracker = CheckpointTracker::new(&dest, tag);
    let first = tracker.current_watermark().await.unwrap();
    let second = tracker.current_watermark().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_tracker_surfaces_destination_errors() {
    let dest = MemoryDestination::new();
    dest.set_fail_watermark(true);
    let tracker = CheckpointTracker::new(&dest, EntityTag::new("activity").unwrap());
    let err = tracker.current_watermark().await.unwrap_err();
    assert!(matches!(err, SyncError::Storage { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_tracker_times_out() {
    let dest = MemoryDestination::new();
    dest.set_delay(Some(StdDuration::from_secs(60)));
    let tracker = CheckpointTracker::new(&dest, EntityTag::new("activity").unwrap())
        .with_timeout(Some(StdDuration::from_secs(1)));
    let err = tracker.current_watermark().await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout { .. }));
}
