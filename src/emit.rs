//! Report emission for caller-side audit.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use sync_core::SyncReport;

/// Write `report` as pretty JSON into `dir`, creating it if needed.
///
/// Files are named `<entity>-<started_at>.json` so successive passes never
/// overwrite each other.
pub fn emit_report(dir: &Path, report: &SyncReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
    let name = format!(
        "{}-{}.json",
        report.entity_tag,
        report.started_at.format("%Y%m%dT%H%M%S%.6fZ")
    );
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    tracing::info!("Report written to {}", path.display());
    Ok(path)
}
