//! One synchronization pass for one entity kind.
//!
//! ```text
//! Idle -> ComputingBoundary -> Extracting -> Processing -> Completed
//!               |                  |              |
//!               +------------------+--------------+--> Aborted
//! ```
//!
//! Structural failures (watermark, extraction, reference data) abort the
//! pass. Per-record failures are tallied; only the circuit breaker or
//! cancellation stops `Processing` early. The caller always receives a
//! [`SyncReport`].

use crate::apply::UpsertApplier;
use crate::projection::Projector;
use crate::reference::{Lookup, ReferenceCache};
use checkpoint::{CheckpointTracker, Watermark};
use std::time::Duration;
use sync_core::{
    decide, AbortReason, ChangeRecord, EntityTag, ExternalIdentity, IdentityResolver, SyncDecision,
    SyncError, SyncReport, SyncStage, DEFAULT_MAX_DIAGNOSTICS,
};
use sync_store::{bounded, ChangeSource, DestinationStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Consecutive per-record errors that abort a pass.
pub const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: usize = 10;

/// Re-scan window behind the watermark.
pub fn default_safety_margin() -> chrono::Duration {
    chrono::Duration::days(1)
}

/// Everything a pass needs besides the stores.
#[derive(Debug, Clone)]
pub struct PassConfig {
    /// Entity tag and natural key fields.
    pub identity: IdentityResolver,
    /// Record field holding the source-side modification timestamp.
    pub modified_field: String,
    /// Fields written to the destination; empty writes every non-key field.
    pub payload_columns: Vec<String>,
    pub lookups: Vec<Lookup>,
    pub safety_margin: chrono::Duration,
    /// Bound on every store call. `None` is unbounded.
    pub store_timeout: Option<Duration>,
    pub circuit_breaker_threshold: usize,
    pub max_diagnostics: usize,
    /// Watermark used when the destination holds no rows for the entity.
    pub default_epoch: Watermark,
    pub dry_run: bool,
    /// Use this watermark instead of deriving it from the destination.
    pub incremental_from: Option<Watermark>,
}

impl PassConfig {
    pub fn new(identity: IdentityResolver, modified_field: impl Into<String>) -> Self {
        Self {
            identity,
            modified_field: modified_field.into(),
            payload_columns: Vec::new(),
            lookups: Vec::new(),
            safety_margin: default_safety_margin(),
            store_timeout: None,
            circuit_breaker_threshold: DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            max_diagnostics: DEFAULT_MAX_DIAGNOSTICS,
            default_epoch: Watermark::default_epoch(),
            dry_run: false,
            incremental_from: None,
        }
    }

    pub fn entity_tag(&self) -> &EntityTag {
        self.identity.tag()
    }

    fn projector(&self) -> Projector {
        Projector::new(
            self.payload_columns.clone(),
            self.identity.natural_keys(),
            &self.modified_field,
            self.lookups.clone(),
        )
    }
}

/// Run one pass: derive the watermark, extract the window behind it and
/// apply every candidate with last-writer-wins semantics.
///
/// `references` is owned by the caller and may be reused across passes;
/// tables already loaded are not read again until it is invalidated.
pub async fn run_sync_pass<S, D>(
    source: &S,
    destination: &D,
    config: &PassConfig,
    references: &mut ReferenceCache,
    cancel: &CancellationToken,
) -> SyncReport
where
    S: ChangeSource,
    D: DestinationStore,
{
    let span = info_span!("sync_pass", entity = %config.entity_tag());
    let report = run_pass_inner(source, destination, config, references, cancel)
        .instrument(span)
        .await;
    info!("{}", report.summary());
    report
}

async fn run_pass_inner<S, D>(
    source: &S,
    destination: &D,
    config: &PassConfig,
    references: &mut ReferenceCache,
    cancel: &CancellationToken,
) -> SyncReport
where
    S: ChangeSource,
    D: DestinationStore,
{
    let entity_tag = config.entity_tag();
    let mut report = SyncReport::new(entity_tag.as_str(), config.max_diagnostics);
    report.dry_run = config.dry_run;

    // ComputingBoundary
    let watermark = match config.incremental_from {
        Some(watermark) => {
            info!("Using explicit watermark {watermark}");
            watermark
        }
        None => {
            let tracker = CheckpointTracker::new(destination, entity_tag.clone())
                .with_default_epoch(config.default_epoch)
                .with_timeout(config.store_timeout);
            match tracker.current_watermark().await {
                Ok(watermark) => watermark,
                Err(e) => {
                    error!("Cannot derive watermark: {e}");
                    return report.abort(
                        SyncStage::ComputingBoundary,
                        AbortReason::WatermarkUnavailable,
                        e.to_string(),
                    );
                }
            }
        }
    };
    let start_boundary = watermark.start_boundary(config.safety_margin);
    report.watermark = Some(watermark.timestamp());
    report.start_boundary = Some(start_boundary);
    info!("Watermark {watermark}, extracting from {start_boundary}");

    if cancel.is_cancelled() {
        warn!("Pass cancelled before extraction");
        return report.abort(
            SyncStage::ComputingBoundary,
            AbortReason::Cancelled,
            SyncError::Cancelled.to_string(),
        );
    }

    // Extracting
    let extraction = tokio::select! {
        result = bounded("extract changes", config.store_timeout, source.extract(start_boundary)) => result,
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
    };
    let candidates = match extraction {
        Ok(candidates) => candidates,
        Err(SyncError::Cancelled) => {
            warn!("Pass cancelled during extraction");
            return report.abort(
                SyncStage::Extracting,
                AbortReason::Cancelled,
                SyncError::Cancelled.to_string(),
            );
        }
        Err(e) => {
            error!("Extraction failed: {e}");
            return report.abort(
                SyncStage::Extracting,
                AbortReason::ExtractionFailed,
                e.to_string(),
            );
        }
    };
    report.candidates = candidates.len();
    info!("Extracted {} candidates", candidates.len());
    if candidates.is_empty() {
        return report.complete();
    }

    if let Err(e) = references
        .ensure_loaded(source, &config.lookups, config.store_timeout)
        .await
    {
        error!("Reference data unavailable: {e}");
        return report.abort(
            SyncStage::Extracting,
            AbortReason::ExtractionFailed,
            e.to_string(),
        );
    }

    // Processing
    let projector = config.projector();
    let applier = UpsertApplier::new(destination, entity_tag)
        .with_timeout(config.store_timeout)
        .with_dry_run(config.dry_run);
    let threshold = config.circuit_breaker_threshold.max(1);
    let mut consecutive_errors = 0usize;

    for (index, record) in candidates.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(
                "Pass cancelled after {index} of {} candidates",
                candidates.len()
            );
            return report.abort(
                SyncStage::Processing,
                AbortReason::Cancelled,
                format!("stopped after {index} of {} candidates", candidates.len()),
            );
        }

        let (identity, modified_at) = match validate(config, record) {
            Ok(valid) => valid,
            Err(e) => {
                debug!("Rejected candidate {index}: {e}");
                report.record(SyncDecision::Rejected);
                report.push_diagnostic(format!("candidate {index} rejected: {e}"));
                continue;
            }
        };

        let outcome = process_record(
            destination,
            config,
            &applier,
            &projector,
            references,
            record,
            &identity,
            modified_at,
        )
        .await;

        match outcome {
            Ok(decision) => {
                debug!("{identity}: {decision}");
                report.record(decision);
                consecutive_errors = 0;
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!("{identity}: {e}");
                report.record_error(format!("{identity}: {e}"));
                if consecutive_errors >= threshold {
                    let tripped = SyncError::CircuitBreakerTripped { consecutive_errors };
                    error!("{tripped}");
                    return report.abort(
                        SyncStage::Processing,
                        AbortReason::CircuitBreakerTripped,
                        tripped.to_string(),
                    );
                }
            }
        }
    }

    report.complete()
}

fn validate(
    config: &PassConfig,
    record: &ChangeRecord,
) -> Result<(ExternalIdentity, chrono::DateTime<chrono::Utc>), SyncError> {
    record.check_readable()?;
    let modified_at = record.modified_at(&config.modified_field)?;
    let identity = config.identity.resolve(record)?;
    Ok((identity, modified_at))
}

#[allow(clippy::too_many_arguments)]
async fn process_record<D: DestinationStore>(
    destination: &D,
    config: &PassConfig,
    applier: &UpsertApplier<'_, D>,
    projector: &Projector,
    references: &ReferenceCache,
    record: &ChangeRecord,
    identity: &ExternalIdentity,
    modified_at: chrono::DateTime<chrono::Utc>,
) -> Result<SyncDecision, SyncError> {
    // Read at decision time so a repeated identity sees the earlier write.
    let existing = bounded(
        &format!("look up {identity}"),
        config.store_timeout,
        destination.existing_modified_at(config.entity_tag(), identity),
    )
    .await?;

    let decision = decide(modified_at, existing);
    if decision.writes() {
        let fields = projector.project(record, references);
        applier.apply(identity, decision, &fields, modified_at).await?;
    }
    Ok(decision)
}
