//! Caller cancellation of an in-flight pass.

mod common;

use chrono::{DateTime, Utc};
use common::{activity, config, source, tag};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use sync_core::{AbortReason, EntityTag, ExternalIdentity, PassOutcome, SyncStage};
use sync_store::{DestinationStore, MemoryDestination, ProjectedFields};
use watermark_sync::{run_sync_pass, CancellationToken, ReferenceCache};

/// Destination that cancels the pass after a number of successful writes.
struct CancelAfterWrites {
    inner: MemoryDestination,
    token: CancellationToken,
    after: usize,
    writes: AtomicUsize,
}

#[async_trait::async_trait]
impl DestinationStore for CancelAfterWrites {
    async fn max_modified_at(&self, entity_tag: &EntityTag) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.inner.max_modified_at(entity_tag).await
    }

    async fn existing_modified_at(
        &self,
        entity_tag: &EntityTag,
        identity: &ExternalIdentity,
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.inner.existing_modified_at(entity_tag, identity).await
    }

    async fn upsert(
        &self,
        entity_tag: &EntityTag,
        identity: &ExternalIdentity,
        fields: &ProjectedFields,
        modified_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.inner
            .upsert(entity_tag, identity, fields, modified_at)
            .await?;
        if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.token.cancel();
        }
        Ok(())
    }
}

fn five_activities() -> Vec<sync_core::ChangeRecord> {
    (0..5)
        .map(|i| activity(&format!("A{i}"), &format!("2025-09-01T10:0{i}:00")))
        .collect()
}

#[tokio::test]
async fn test_cancelled_before_start_never_extracts() {
    let src = source(five_activities());
    let dest = MemoryDestination::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report =
        run_sync_pass(&src, &dest, &config(), &mut ReferenceCache::new(), &cancel).await;

    assert_eq!(
        report.outcome,
        PassOutcome::Aborted {
            stage: SyncStage::ComputingBoundary,
            reason: AbortReason::Cancelled,
        }
    );
    assert_eq!(src.extract_calls(), 0);
    assert!(!report.success);
}

#[tokio::test]
async fn test_cancellation_stops_between_records() {
    let src = source(five_activities());
    let token = CancellationToken::new();
    let dest = CancelAfterWrites {
        inner: MemoryDestination::new(),
        token: token.clone(),
        after: 2,
        writes: AtomicUsize::new(0),
    };

    let report = run_sync_pass(&src, &dest, &config(), &mut ReferenceCache::new(), &token).await;

    assert_eq!(
        report.outcome,
        PassOutcome::Aborted {
            stage: SyncStage::Processing,
            reason: AbortReason::Cancelled,
        }
    );
    assert_eq!(report.inserted, 2);
    assert_eq!(report.unprocessed, 3);
    assert_eq!(dest.inner.len(&tag()), 2);
    assert_eq!(dest.inner.upsert_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_slow_extraction() {
    let src = source(five_activities());
    src.set_delay(Some(Duration::from_secs(600)));
    let dest = MemoryDestination::new();
    let token = CancellationToken::new();
    let mut references = ReferenceCache::new();
    let cfg = config();

    let canceller = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    };
    let (report, ()) = tokio::join!(
        run_sync_pass(&src, &dest, &cfg, &mut references, &token),
        canceller
    );

    assert_eq!(
        report.outcome,
        PassOutcome::Aborted {
            stage: SyncStage::Extracting,
            reason: AbortReason::Cancelled,
        }
    );
    assert!(dest.is_empty());
}
