//! Source and destination store traits.
//!
//! These traits are the only seams between the sync pass and concrete
//! databases. The pass is written against them generically, so the CLI picks
//! an implementation once and everything after is statically dispatched.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use sync_core::{ChangeRecord, EntityTag, ExternalIdentity, FieldValue};

/// Fields written to the destination for one record, keyed by field name.
pub type ProjectedFields = BTreeMap<String, FieldValue>;

/// Convert projected fields to the JSON object stored by destinations.
pub fn projected_to_json(fields: &ProjectedFields) -> serde_json::Value {
    serde_json::Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// A static key/value table read from the source, e.g. technician id to name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceQuery {
    pub table: String,
    pub key_column: String,
    pub value_column: String,
}

/// Read side of the upstream operational database.
///
/// # Usage Pattern
///
/// ```ignore
/// pub async fn run_sync_pass<S: ChangeSource, D: DestinationStore>(
///     source: &S,
///     destination: &D,
///     config: &PassConfig,
/// ) -> SyncReport {
///     let candidates = source.extract(start_boundary).await?;
///     // ...
/// }
/// ```
#[async_trait::async_trait]
pub trait ChangeSource: Send + Sync {
    /// Return every row with `modifiedAt >= start_boundary` (nulls excluded,
    /// static exclusion predicate applied), ascending by `modifiedAt`.
    ///
    /// The whole window is returned; implementations must not apply a row limit.
    async fn extract(&self, start_boundary: DateTime<Utc>) -> Result<Vec<ChangeRecord>>;

    /// Load a reference table as a key to value map. Keys are rendered with
    /// [`sync_core::FieldValue::key_text`] so they match record fields.
    async fn load_reference(&self, query: &ReferenceQuery) -> Result<HashMap<String, String>>;
}

/// Write side: a store with upsert-by-external-id semantics.
///
/// Every method is a single statement against the store; no transaction spans
/// more than one record.
#[async_trait::async_trait]
pub trait DestinationStore: Send + Sync {
    /// Maximum non-null `modifiedAt` among rows tagged `entity_tag`.
    async fn max_modified_at(&self, entity_tag: &EntityTag) -> Result<Option<DateTime<Utc>>>;

    /// `modifiedAt` of the row keyed by `identity`, if one exists.
    async fn existing_modified_at(
        &self,
        entity_tag: &EntityTag,
        identity: &ExternalIdentity,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Insert or overwrite the row keyed by `identity`.
    async fn upsert(
        &self,
        entity_tag: &EntityTag,
        identity: &ExternalIdentity,
        fields: &ProjectedFields,
        modified_at: DateTime<Utc>,
    ) -> Result<()>;
}
