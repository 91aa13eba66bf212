//! watermark-sync library
//!
//! Keeps a destination store eventually consistent with an upstream
//! operational database by repeatedly extracting rows changed since the last
//! synchronized modification timestamp and applying them with
//! last-writer-wins semantics.
//!
//! # Components
//!
//! - `sync_core` - identity, decisions, records and the pass report
//! - `sync_store` - `ChangeSource` / `DestinationStore` traits, in-memory stores
//! - `checkpoint` - watermark derivation from destination rows
//! - `watermark_sync_postgresql_source` / `watermark_sync_postgresql_sink` - PostgreSQL adapters
//! - [`run_sync_pass`] - the orchestrator tying them together
//!
//! # CLI Usage
//!
//! ```bash
//! # One pass for the entity described in activity.toml
//! watermark-sync run --config activity.toml \
//!   --source-uri postgresql://ops@localhost/ops \
//!   --destination-uri postgresql://reporting@localhost/reporting
//!
//! # Show the derived watermark
//! watermark-sync watermark --config activity.toml
//! ```

use clap::Parser;

mod apply;
pub mod config;
mod emit;
mod projection;
pub mod reference;
pub mod sync;

pub use apply::UpsertApplier;
pub use config::FileConfig;
pub use emit::emit_report;
pub use projection::Projector;
pub use reference::{Lookup, ReferenceCache};
pub use sync::{
    default_safety_margin, run_sync_pass, PassConfig, DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
};

pub use checkpoint::{Checkpoint, CheckpointTracker, Watermark};
pub use sync_core::{SyncDecision, SyncError, SyncReport};
pub use tokio_util::sync::CancellationToken;

#[derive(Parser, Clone, Debug)]
pub struct SourceArgs {
    /// Source PostgreSQL connection string
    #[arg(long, env = "WATERMARK_SYNC_SOURCE_URI")]
    pub source_uri: String,
}

#[derive(Parser, Clone, Debug)]
pub struct DestinationArgs {
    /// Destination PostgreSQL connection string
    #[arg(long, env = "WATERMARK_SYNC_DESTINATION_URI")]
    pub destination_uri: String,
}

/// Command-line overrides for the `[sync]` table of the config file.
#[derive(Parser, Clone, Debug, Default)]
pub struct PassOverrides {
    /// Re-scan window behind the watermark (e.g. "1d", "6h", "3600")
    #[arg(long)]
    pub safety_margin: Option<String>,

    /// Timeout for each source or destination call (e.g. "30s")
    #[arg(long)]
    pub store_timeout: Option<String>,

    /// Consecutive per-record errors that abort the pass
    #[arg(long)]
    pub circuit_breaker_threshold: Option<usize>,

    /// Dry run mode - compute decisions without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Extract from this watermark instead of the derived one (RFC 3339)
    #[arg(long)]
    pub incremental_from: Option<String>,
}

impl From<&DestinationArgs> for watermark_sync_postgresql_sink::DestinationOpts {
    fn from(args: &DestinationArgs) -> Self {
        Self {
            destination_uri: args.destination_uri.clone(),
        }
    }
}
