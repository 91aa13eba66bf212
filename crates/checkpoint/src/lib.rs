//! Watermark tracking for watermark-sync
//!
//! The watermark is the most recent `modifiedAt` already reflected in the
//! destination for one entity kind. It is derived from the destination rows
//! themselves, so there is no checkpoint table to keep consistent with the
//! data.
//!
//! # Architecture
//!
//! - [`Checkpoint`] - string form of a resume position, used on the command line
//! - [`Watermark`] - the timestamp checkpoint, with the named default epoch
//! - [`CheckpointTracker`] - reads the watermark from a `DestinationStore`

mod tracker;
mod watermark;

#[cfg(test)]
mod tests;

pub use tracker::CheckpointTracker;
pub use watermark::{Watermark, DEFAULT_EPOCH_RFC3339};

/// Trait for resume positions that can be passed on the command line.
///
/// # Example
///
/// ```rust
/// use checkpoint::{Checkpoint, Watermark};
///
/// let watermark = Watermark::from_cli_string("2025-09-01T00:00:00Z").unwrap();
/// assert_eq!(watermark.to_cli_string(), "2025-09-01T00:00:00.000000Z");
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Checkpoint type identifier, used in logs and CLI output.
    const CHECKPOINT_TYPE: &'static str;

    /// Convert to CLI-friendly string format.
    ///
    /// The returned string should be parseable by `from_cli_string()`.
    fn to_cli_string(&self) -> String;

    /// Parse from CLI string format.
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}
