//! Shared fixtures for the sync pass integration tests.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDateTime, Utc};
use sync_core::{ChangeRecord, EntityTag, ExternalIdentity, IdentityResolver, SyncReport};
use sync_store::{ChangeSource, DestinationStore, MemorySource};
use watermark_sync::{run_sync_pass, CancellationToken, PassConfig, ReferenceCache};

pub const MODIFIED: &str = "modified_at";
pub const TAG: &str = "activity";

/// Parse `YYYY-MM-DDTHH:MM:SS` as UTC.
pub fn ts(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .unwrap()
        .and_utc()
}

pub fn tag() -> EntityTag {
    EntityTag::new(TAG).unwrap()
}

pub fn identity(id: &str) -> ExternalIdentity {
    ExternalIdentity::from_stored(format!("{TAG}|{id}"))
}

pub fn activity(id: &str, modified_at: &str) -> ChangeRecord {
    ChangeRecord::new()
        .with("id", id)
        .with("status", "open")
        .with(MODIFIED, ts(modified_at))
}

pub fn config() -> PassConfig {
    let resolver = IdentityResolver::new(tag(), vec!["id".to_string()]).unwrap();
    PassConfig::new(resolver, MODIFIED)
}

pub fn source(records: Vec<ChangeRecord>) -> MemorySource {
    MemorySource::new(MODIFIED).with_records(records)
}

/// Run a pass with a fresh reference cache and an untriggered token.
pub async fn run_pass<S: ChangeSource, D: DestinationStore>(
    source: &S,
    destination: &D,
    config: &PassConfig,
) -> SyncReport {
    let mut references = ReferenceCache::new();
    run_sync_pass(
        source,
        destination,
        config,
        &mut references,
        &CancellationToken::new(),
    )
    .await
}
