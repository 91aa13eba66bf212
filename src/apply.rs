//! Upsert application of a decided record.

use chrono::{DateTime, Utc};
use std::time::Duration;
use sync_core::{EntityTag, ExternalIdentity, SyncDecision, SyncError};
use sync_store::{bounded, DestinationStore, ProjectedFields};
use tracing::debug;

/// Writes one record per non-skip decision. No batching.
pub struct UpsertApplier<'a, D: DestinationStore> {
    destination: &'a D,
    entity_tag: &'a EntityTag,
    timeout: Option<Duration>,
    dry_run: bool,
}

impl<'a, D: DestinationStore> UpsertApplier<'a, D> {
    pub fn new(destination: &'a D, entity_tag: &'a EntityTag) -> Self {
        Self {
            destination,
            entity_tag,
            timeout: None,
            dry_run: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tally decisions without touching the destination.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn apply(
        &self,
        identity: &ExternalIdentity,
        decision: SyncDecision,
        fields: &ProjectedFields,
        modified_at: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        if !decision.writes() {
            return Ok(());
        }
        if self.dry_run {
            debug!("Dry run: would {decision} {identity}");
            return Ok(());
        }
        bounded(
            &format!("{decision} {identity}"),
            self.timeout,
            self.destination
                .upsert(self.entity_tag, identity, fields, modified_at),
        )
        .await
    }
}
