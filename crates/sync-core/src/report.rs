//! Aggregate result of one synchronization pass.

use crate::decision::SyncDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default cap on diagnostic messages kept in a report.
pub const DEFAULT_MAX_DIAGNOSTICS: usize = 50;

/// Stages of the pass state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Idle,
    ComputingBoundary,
    Extracting,
    Processing,
    Completed,
    Aborted,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ComputingBoundary => "computing_boundary",
            Self::Extracting => "extracting",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pass ended in [`SyncStage::Aborted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    WatermarkUnavailable,
    ExtractionFailed,
    CircuitBreakerTripped,
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WatermarkUnavailable => "watermark unavailable",
            Self::ExtractionFailed => "extraction failed",
            Self::CircuitBreakerTripped => "circuit breaker tripped",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Terminal outcome of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PassOutcome {
    /// All candidates were consumed.
    Completed,
    /// The pass stopped early; `stage` is the stage it was in when it stopped.
    Aborted { stage: SyncStage, reason: AbortReason },
}

/// Result of one pass, always returned to the caller, even on abort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub entity_tag: String,
    /// Watermark read at the start of the pass.
    pub watermark: Option<DateTime<Utc>>,
    /// Lower bound handed to the extractor.
    pub start_boundary: Option<DateTime<Utc>>,
    /// Candidates returned by the extractor.
    pub candidates: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub rejected: usize,
    /// Per-record storage errors.
    pub errors: usize,
    /// Candidates never attempted because the pass stopped early.
    pub unprocessed: usize,
    pub diagnostics: Vec<String>,
    /// Diagnostics discarded once the cap was reached.
    pub diagnostics_dropped: usize,
    pub outcome: PassOutcome,
    pub success: bool,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    max_diagnostics: usize,
}

impl SyncReport {
    /// Start a fresh report for one pass.
    pub fn new(entity_tag: impl Into<String>, max_diagnostics: usize) -> Self {
        Self {
            entity_tag: entity_tag.into(),
            watermark: None,
            start_boundary: None,
            candidates: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
            rejected: 0,
            errors: 0,
            unprocessed: 0,
            diagnostics: Vec::new(),
            diagnostics_dropped: 0,
            outcome: PassOutcome::Completed,
            success: false,
            dry_run: false,
            started_at: Utc::now(),
            finished_at: None,
            max_diagnostics,
        }
    }

    /// Tally one decision.
    pub fn record(&mut self, decision: SyncDecision) {
        match decision {
            SyncDecision::Insert => self.inserted += 1,
            SyncDecision::Update => self.updated += 1,
            SyncDecision::Skip => self.skipped += 1,
            SyncDecision::Rejected => self.rejected += 1,
        }
    }

    /// Tally a per-record error and keep its message.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.push_diagnostic(message);
    }

    /// Keep a diagnostic message, up to the configured cap.
    pub fn push_diagnostic(&mut self, message: impl Into<String>) {
        if self.diagnostics.len() < self.max_diagnostics {
            self.diagnostics.push(message.into());
        } else {
            self.diagnostics_dropped += 1;
        }
    }

    /// Candidates that reached a decision or an error.
    pub fn processed(&self) -> usize {
        self.inserted + self.updated + self.skipped + self.rejected + self.errors
    }

    /// Finish the pass successfully; success requires zero per-record errors.
    pub fn complete(mut self) -> Self {
        self.outcome = PassOutcome::Completed;
        self.success = self.errors == 0;
        self.finished_at = Some(Utc::now());
        self
    }

    /// Finish the pass early. Candidates not yet processed are counted as unprocessed.
    ///
    /// The stage and reason message is always appended, even past the cap.
    pub fn abort(mut self, stage: SyncStage, reason: AbortReason, message: impl Into<String>) -> Self {
        self.unprocessed = self.candidates.saturating_sub(self.processed());
        self.diagnostics
            .push(format!("{stage}: {reason}: {}", message.into()));
        self.outcome = PassOutcome::Aborted { stage, reason };
        self.success = false;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, PassOutcome::Aborted { .. })
    }

    /// One-line summary for logs and the human CLI output.
    pub fn summary(&self) -> String {
        let state = match self.outcome {
            PassOutcome::Completed => "completed".to_string(),
            PassOutcome::Aborted { stage, reason } => format!("aborted during {stage} ({reason})"),
        };
        format!(
            "{}: {state}; candidates={} inserted={} updated={} skipped={} rejected={} errors={} unprocessed={} success={}",
            self.entity_tag,
            self.candidates,
            self.inserted,
            self.updated,
            self.skipped,
            self.rejected,
            self.errors,
            self.unprocessed,
            self.success
        )
    }
}
