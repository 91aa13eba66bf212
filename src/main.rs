//! Command-line interface for watermark-sync
//!
//! # Usage Examples
//!
//! ## One pass
//! ```bash
//! watermark-sync run --config activity.toml \
//!   --source-uri postgresql://ops@localhost/ops \
//!   --destination-uri postgresql://reporting@localhost/reporting
//!
//! # Decide without writing, print the report as JSON
//! watermark-sync run --config activity.toml --dry-run --json
//!
//! # Re-scan from an explicit watermark and keep the report
//! watermark-sync run --config activity.toml \
//!   --incremental-from "2025-09-01T00:00:00Z" \
//!   --emit-report .watermark-sync-reports
//! ```
//!
//! ## Inspection and setup
//! ```bash
//! watermark-sync watermark --config activity.toml
//! watermark-sync init-destination --config activity.toml
//! ```
//!
//! Connection strings fall back to `WATERMARK_SYNC_SOURCE_URI` and
//! `WATERMARK_SYNC_DESTINATION_URI`.
//!
//! Exit status: 0 on a successful pass, 1 on a configuration or connection
//! error, 2 when the pass aborted or finished with per-record errors.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sync_core::{PassOutcome, SyncReport};
use tracing::warn;
use watermark_sync::{
    emit_report, run_sync_pass, CancellationToken, Checkpoint, CheckpointTracker, DestinationArgs,
    FileConfig, PassOverrides, ReferenceCache, SourceArgs, Watermark,
};
use watermark_sync_postgresql_sink::DestinationOpts;
use watermark_sync_postgresql_source::SourceOpts;

const EXIT_PASS_FAILED: i32 = 2;

#[derive(Parser)]
#[command(name = "watermark-sync")]
#[command(about = "Incremental watermark-based synchronization between PostgreSQL databases")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synchronization pass for the configured entity
    Run {
        /// Entity configuration file (TOML)
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        destination: DestinationArgs,

        #[command(flatten)]
        overrides: PassOverrides,

        /// Print the report as JSON instead of a summary
        #[arg(long)]
        json: bool,

        /// Directory to write the report JSON to
        #[arg(long, value_name = "DIR")]
        emit_report: Option<PathBuf>,
    },

    /// Print the watermark derived from the destination
    Watermark {
        /// Entity configuration file (TOML)
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[command(flatten)]
        destination: DestinationArgs,
    },

    /// Create the destination table and its indexes when missing
    InitDestination {
        /// Entity configuration file (TOML)
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[command(flatten)]
        destination: DestinationArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match run().await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(EXIT_PASS_FAILED),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns `false` when a pass ran but did not succeed.
async fn run() -> anyhow::Result<bool> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            source,
            destination,
            overrides,
            json,
            emit_report: report_dir,
        } => {
            let file = FileConfig::from_file(&config)?;
            let pass = file.pass_config(&overrides)?;

            let source_opts = SourceOpts {
                source_uri: source.source_uri,
                source_timezone: file.entity.source_timezone.clone(),
            };
            let change_source =
                watermark_sync_postgresql_source::connect(&source_opts, file.source_table())
                    .await
                    .context("Failed to connect to source")?;
            let store = watermark_sync_postgresql_sink::connect(
                &DestinationOpts::from(&destination),
                file.destination_table(),
            )
            .await
            .context("Failed to connect to destination")?;

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current record");
                    interrupt.cancel();
                }
            });

            let mut references = ReferenceCache::new();
            let report =
                run_sync_pass(&change_source, &store, &pass, &mut references, &cancel).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if let Some(dir) = report_dir {
                let path = emit_report(&dir, &report)?;
                eprintln!("Report written to {}", path.display());
            }
            Ok(report.success)
        }
        Commands::Watermark {
            config,
            destination,
        } => {
            let file = FileConfig::from_file(&config)?;
            let pass = file.pass_config(&PassOverrides::default())?;
            let store = watermark_sync_postgresql_sink::connect(
                &DestinationOpts::from(&destination),
                file.destination_table(),
            )
            .await
            .context("Failed to connect to destination")?;

            let tracker = CheckpointTracker::new(&store, pass.entity_tag().clone())
                .with_default_epoch(pass.default_epoch)
                .with_timeout(pass.store_timeout);
            let (watermark, is_default) = match tracker.last_synced().await? {
                Some(watermark) => (watermark, false),
                None => (tracker.default_epoch(), true),
            };
            println!("entity:         {}", pass.entity_tag());
            println!(
                "{:<16}{}",
                format!("{}:", Watermark::CHECKPOINT_TYPE),
                watermark.to_cli_string()
            );
            println!("default epoch:  {is_default}");
            println!(
                "start boundary: {}",
                watermark.start_boundary(pass.safety_margin)
            );
            Ok(true)
        }
        Commands::InitDestination {
            config,
            destination,
        } => {
            let file = FileConfig::from_file(&config)?;
            let store = watermark_sync_postgresql_sink::connect(
                &DestinationOpts::from(&destination),
                file.destination_table(),
            )
            .await
            .context("Failed to connect to destination")?;
            store.ensure_table().await?;
            println!("Destination table {} is ready", file.destination.table);
            Ok(true)
        }
    }
}

fn print_report(report: &SyncReport) {
    println!("{}", report.summary());
    if let Some(watermark) = report.watermark {
        println!("  watermark:      {watermark}");
    }
    if let Some(boundary) = report.start_boundary {
        println!("  start boundary: {boundary}");
    }
    if report.dry_run {
        println!("  dry run: no rows were written");
    }
    if let PassOutcome::Aborted { stage, reason } = report.outcome {
        println!("  aborted during {stage}: {reason}");
    }
    for diagnostic in &report.diagnostics {
        println!("  - {diagnostic}");
    }
    if report.diagnostics_dropped > 0 {
        println!("  ... {} more diagnostics dropped", report.diagnostics_dropped);
    }
}
