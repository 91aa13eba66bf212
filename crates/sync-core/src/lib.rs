//! Core types for the watermark-sync engine.
//!
//! This crate holds the pure, storage-independent pieces of a pass:
//!
//! - [`ChangeRecord`] / [`FieldValue`] - rows read from the source
//! - [`IdentityResolver`] / [`ExternalIdentity`] - deterministic row identity
//! - [`decide`] / [`SyncDecision`] - last-writer-wins conflict resolution
//! - [`SyncReport`] - per-pass aggregate result
//! - [`ValidationError`] / [`SyncError`] - the error taxonomy
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── sync-store          (source/destination traits, in-memory stores)
//!    ├─── checkpoint          (watermark tracking)
//!    ├─── postgresql-source   (PostgreSQL change extraction)
//!    └─── postgresql-sink     (PostgreSQL destination)
//! ```

pub mod decision;
pub mod error;
pub mod identity;
pub mod record;
pub mod report;
pub mod values;

pub use decision::{decide, SyncDecision};
pub use error::{SyncError, ValidationError};
pub use identity::{
    EntityTag, ExternalIdentity, IdentityConfigError, IdentityResolver, IDENTITY_SCHEME_VERSION,
    IDENTITY_SEPARATOR,
};
pub use record::ChangeRecord;
pub use report::{AbortReason, PassOutcome, SyncReport, SyncStage, DEFAULT_MAX_DIAGNOSTICS};
pub use values::FieldValue;
