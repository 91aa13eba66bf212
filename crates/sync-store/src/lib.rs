//! Store abstractions for watermark-sync.
//!
//! This crate defines the `ChangeSource` and `DestinationStore` traits the
//! sync pass is written against, plus in-memory implementations used by
//! tests and local dry runs.
//!
//! The traits exchange sync-core types (ChangeRecord, ExternalIdentity,
//! FieldValue) so adapters never leak database-specific types into the pass.

mod bounded;
pub mod memory;
mod traits;

pub use bounded::bounded;
pub use memory::{MemoryDestination, MemorySource, StoredRow};
pub use traits::{projected_to_json, ChangeSource, DestinationStore, ProjectedFields, ReferenceQuery};
