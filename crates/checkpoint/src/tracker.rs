//! Watermark derivation from destination data.

use crate::watermark::Watermark;
use crate::Checkpoint;
use std::time::Duration;
use sync_core::{EntityTag, SyncError};
use sync_store::{bounded, DestinationStore};
use tracing::debug;

/// Reads the watermark for one entity kind from the destination.
///
/// Read-only and idempotent. Errors are surfaced as-is and never retried
/// locally: without a trustworthy watermark a pass cannot bound its window.
pub struct CheckpointTracker<'a, D: DestinationStore> {
    destination: &'a D,
    entity_tag: EntityTag,
    default_epoch: Watermark,
    timeout: Option<Duration>,
}

impl<'a, D: DestinationStore> CheckpointTracker<'a, D> {
    /// Create a tracker using [`Watermark::default_epoch`] for empty destinations.
    pub fn new(destination: &'a D, entity_tag: EntityTag) -> Self {
        Self {
            destination,
            entity_tag,
            default_epoch: Watermark::default_epoch(),
            timeout: None,
        }
    }

    /// Override the watermark used when no rows exist yet.
    pub fn with_default_epoch(mut self, default_epoch: Watermark) -> Self {
        self.default_epoch = default_epoch;
        self
    }

    /// Bound the destination query by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn default_epoch(&self) -> Watermark {
        self.default_epoch
    }

    /// Maximum `modifiedAt` persisted for this entity, or `None` on a first run.
    pub async fn last_synced(&self) -> Result<Option<Watermark>, SyncError> {
        let max = bounded(
            "read destination watermark",
            self.timeout,
            self.destination.max_modified_at(&self.entity_tag),
        )
        .await?;
        Ok(max.map(Watermark::new))
    }

    /// The watermark to extract from, falling back to the default epoch when
    /// the destination holds no rows for this entity.
    pub async fn current_watermark(&self) -> Result<Watermark, SyncError> {
        match self.last_synced().await? {
            Some(watermark) => {
                debug!(
                    "{} for {}: {}",
                    Watermark::CHECKPOINT_TYPE,
                    self.entity_tag,
                    watermark
                );
                Ok(watermark)
            }
            None => {
                debug!(
                    "No destination rows for {}, starting from default epoch {}",
                    self.entity_tag, self.default_epoch
                );
                Ok(self.default_epoch)
            }
        }
    }
}
