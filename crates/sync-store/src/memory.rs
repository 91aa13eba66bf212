//! In-memory source and destination.
//!
//! Both stores follow the same contracts as the database adapters, and expose
//! failure injection so the pass can be exercised against outages, slow
//! stores and late-committing rows without a running database.

use crate::traits::{ChangeSource, DestinationStore, ProjectedFields, ReferenceQuery};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use sync_core::{ChangeRecord, EntityTag, ExternalIdentity};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory change source.
pub struct MemorySource {
    modified_field: String,
    records: Mutex<Vec<ChangeRecord>>,
    references: Mutex<HashMap<String, Vec<ChangeRecord>>>,
    /// Emit records as stored, without the window filter or ordering.
    unfiltered: bool,
    fail_extraction: AtomicBool,
    delay: Mutex<Option<Duration>>,
    extract_calls: AtomicUsize,
    reference_loads: AtomicUsize,
    last_boundary: Mutex<Option<DateTime<Utc>>>,
}

impl MemorySource {
    /// Create a source whose rows carry their modification timestamp in `modified_field`.
    pub fn new(modified_field: impl Into<String>) -> Self {
        Self {
            modified_field: modified_field.into(),
            records: Mutex::new(Vec::new()),
            references: Mutex::new(HashMap::new()),
            unfiltered: false,
            fail_extraction: AtomicBool::new(false),
            delay: Mutex::new(None),
            extract_calls: AtomicUsize::new(0),
            reference_loads: AtomicUsize::new(0),
            last_boundary: Mutex::new(None),
        }
    }

    /// Create a source that returns every stored record verbatim, including
    /// rows a real query would have filtered out. Used to feed malformed rows
    /// into the pass.
    pub fn unfiltered(modified_field: impl Into<String>) -> Self {
        Self {
            unfiltered: true,
            ..Self::new(modified_field)
        }
    }

    pub fn with_records(self, records: impl IntoIterator<Item = ChangeRecord>) -> Self {
        lock(&self.records).extend(records);
        self
    }

    /// Add a row, e.g. to simulate a change committed between passes.
    pub fn push(&self, record: ChangeRecord) {
        lock(&self.records).push(record);
    }

    /// Register rows of a reference table.
    pub fn add_reference_rows(&self, table: impl Into<String>, rows: Vec<ChangeRecord>) {
        lock(&self.references)
            .entry(table.into())
            .or_default()
            .extend(rows);
    }

    pub fn set_fail_extraction(&self, fail: bool) {
        self.fail_extraction.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn reference_loads(&self) -> usize {
        self.reference_loads.load(Ordering::SeqCst)
    }

    /// Boundary passed to the most recent `extract` call.
    pub fn last_boundary(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_boundary)
    }

    async fn maybe_delay(&self) {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl ChangeSource for MemorySource {
    async fn extract(&self, start_boundary: DateTime<Utc>) -> Result<Vec<ChangeRecord>> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_boundary) = Some(start_boundary);
        self.maybe_delay().await;

        if self.fail_extraction.load(Ordering::SeqCst) {
            return Err(anyhow!("source unavailable"));
        }

        let records = lock(&self.records).clone();
        if self.unfiltered {
            return Ok(records);
        }

        let mut window: Vec<(DateTime<Utc>, ChangeRecord)> = records
            .into_iter()
            .filter_map(|r| {
                let ts = r.modified_at(&self.modified_field).ok()?;
                (ts >= start_boundary).then_some((ts, r))
            })
            .collect();
        window.sort_by_key(|(ts, _)| *ts);
        Ok(window.into_iter().map(|(_, r)| r).collect())
    }

    async fn load_reference(&self, query: &ReferenceQuery) -> Result<HashMap<String, String>> {
        self.reference_loads.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;

        let references = lock(&self.references);
        let rows = references
            .get(&query.table)
            .ok_or_else(|| anyhow!("reference table '{}' does not exist", query.table))?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let key = row.get(&query.key_column)?.key_text()?;
                let value = row.get(&query.value_column).filter(|v| !v.is_null())?;
                Some((key, value.to_string()))
            })
            .collect())
    }
}

/// A destination row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub fields: ProjectedFields,
    pub modified_at: DateTime<Utc>,
    /// Number of upserts that touched this row.
    pub writes: usize,
}

/// In-memory destination keyed by `(entity_tag, external_id)`.
#[derive(Default)]
pub struct MemoryDestination {
    rows: Mutex<BTreeMap<(String, String), StoredRow>>,
    failing_identities: Mutex<HashSet<String>>,
    fail_all_upserts: AtomicBool,
    fail_watermark: AtomicBool,
    fail_lookups: AtomicBool,
    delay: Mutex<Option<Duration>>,
    upsert_delay: Mutex<Option<Duration>>,
    upsert_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, bypassing failure injection.
    pub fn seed(
        &self,
        entity_tag: &EntityTag,
        identity: &ExternalIdentity,
        fields: ProjectedFields,
        modified_at: DateTime<Utc>,
    ) {
        lock(&self.rows).insert(
            (entity_tag.to_string(), identity.to_string()),
            StoredRow {
                fields,
                modified_at,
                writes: 0,
            },
        );
    }

    pub fn row(&self, entity_tag: &EntityTag, identity: &ExternalIdentity) -> Option<StoredRow> {
        lock(&self.rows)
            .get(&(entity_tag.to_string(), identity.to_string()))
            .cloned()
    }

    /// Number of rows tagged `entity_tag`.
    pub fn len(&self, entity_tag: &EntityTag) -> usize {
        lock(&self.rows)
            .keys()
            .filter(|(tag, _)| tag == entity_tag.as_str())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.rows).is_empty()
    }

    /// Make upserts for one identity fail.
    pub fn fail_upserts_for(&self, identity: &ExternalIdentity) {
        lock(&self.failing_identities).insert(identity.to_string());
    }

    pub fn set_fail_all_upserts(&self, fail: bool) {
        self.fail_all_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_watermark(&self, fail: bool) {
        self.fail_watermark.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    /// Delay only upserts, on top of any delay set with [`Self::set_delay`].
    pub fn set_upsert_delay(&self, delay: Option<Duration>) {
        *lock(&self.upsert_delay) = delay;
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    async fn maybe_delay(&self) {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl DestinationStore for MemoryDestination {
    async fn max_modified_at(&self, entity_tag: &EntityTag) -> Result<Option<DateTime<Utc>>> {
        self.maybe_delay().await;
        if self.fail_watermark.load(Ordering::SeqCst) {
            return Err(anyhow!("destination unavailable"));
        }
        Ok(lock(&self.rows)
            .iter()
            .filter(|((tag, _), _)| tag == entity_tag.as_str())
            .map(|(_, row)| row.modified_at)
            .max())
    }

    async fn existing_modified_at(
        &self,
        entity_tag: &EntityTag,
        identity: &ExternalIdentity,
    ) -> Result<Option<DateTime<Utc>>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(anyhow!("lookup of '{identity}' failed"));
        }
        Ok(lock(&self.rows)
            .get(&(entity_tag.to_string(), identity.to_string()))
            .map(|row| row.modified_at))
    }

    async fn upsert(
        &self,
        entity_tag: &EntityTag,
        identity: &ExternalIdentity,
        fields: &ProjectedFields,
        modified_at: DateTime<Utc>,
    ) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        let upsert_delay = *lock(&self.upsert_delay);
        if let Some(delay) = upsert_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all_upserts.load(Ordering::SeqCst)
            || lock(&self.failing_identities).contains(identity.as_str())
        {
            return Err(anyhow!("write of '{identity}' rejected by destination"));
        }

        let mut rows = lock(&self.rows);
        let row = rows
            .entry((entity_tag.to_string(), identity.to_string()))
            .or_insert_with(|| StoredRow {
                fields: ProjectedFields::new(),
                modified_at,
                writes: 0,
            });
        row.fields = fields.clone();
        row.modified_at = modified_at;
        row.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sync_core::FieldValue;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_memory_source_filters_window_and_orders_ascending() {
        let source = MemorySource::new("modified_at").with_records([
            ChangeRecord::new().with("id", "late").with("modified_at", ts(3, 0)),
            ChangeRecord::new().with("id", "old").with("modified_at", ts(1, 0)),
            ChangeRecord::new()
                .with("id", "null")
                .with("modified_at", FieldValue::Null),
            ChangeRecord::new().with("id", "early").with("modified_at", ts(2, 0)),
        ]);

        let records = source.extract(ts(2, 0)).await.unwrap();
        let ids: Vec<_> = records
            .iter()
            .map(|r| r.get("id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(source.last_boundary(), Some(ts(2, 0)));
    }

    #[tokio::test]
    async fn test_memory_source_reference_table() {
        let source = MemorySource::new("modified_at");
        source.add_reference_rows(
            "technicians",
            vec![
                ChangeRecord::new().with("id", 7i64).with("name", "Ada"),
                ChangeRecord::new()
                    .with("id", 8i64)
                    .with("name", FieldValue::Null),
            ],
        );
        let query = ReferenceQuery {
            table: "technicians".into(),
            key_column: "id".into(),
            value_column: "name".into(),
        };
        let map = source.load_reference(&query).await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("7").map(String::as_str), Some("Ada"));
    }

    #[tokio::test]
    async fn test_memory_destination_max_is_per_tag() {
        let dest = MemoryDestination::new();
        let a = EntityTag::new("a").unwrap();
        let b = EntityTag::new("b").unwrap();
        dest.seed(&a, &ExternalIdentity::from_stored("a|1"), ProjectedFields::new(), ts(1, 0));
        dest.seed(&b, &ExternalIdentity::from_stored("b|1"), ProjectedFields::new(), ts(5, 0));

        assert_eq!(dest.max_modified_at(&a).await.unwrap(), Some(ts(1, 0)));
        assert_eq!(
            dest.max_modified_at(&EntityTag::new("c").unwrap()).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_memory_destination_upsert_overwrites() {
        let dest = MemoryDestination::new();
        let tag = EntityTag::new("a").unwrap();
        let id = ExternalIdentity::from_stored("a|1");
        let mut fields = ProjectedFields::new();
        fields.insert("status".into(), FieldValue::from("open"));
        dest.upsert(&tag, &id, &fields, ts(1, 0)).await.unwrap();
        fields.insert("status".into(), FieldValue::from("closed"));
        dest.upsert(&tag, &id, &fields, ts(2, 0)).await.unwrap();

        let row = dest.row(&tag, &id).unwrap();
        assert_eq!(row.writes, 2);
        assert_eq!(row.modified_at, ts(2, 0));
        assert_eq!(row.fields.get("status"), Some(&FieldValue::from("closed")));
        assert_eq!(dest.len(&tag), 1);
    }

    #[tokio::test]
    async fn test_memory_destination_failure_injection() {
        let dest = MemoryDestination::new();
        let tag = EntityTag::new("a").unwrap();
        let id = ExternalIdentity::from_stored("a|1");
        dest.fail_upserts_for(&id);
        assert!(dest
            .upsert(&tag, &id, &ProjectedFields::new(), ts(1, 0))
            .await
            .is_err());
        assert_eq!(dest.upsert_calls(), 1);
        assert!(dest.is_empty());

        dest.set_fail_watermark(true);
        assert!(dest.max_modified_at(&tag).await.is_err());
    }
}
