//! Caller-owned cache of reference tables used by lookups.
//!
//! A lookup adds a derived text field to every projected row, e.g. the
//! technician's name for a technician id. The tables are small and static, so
//! each one is loaded from the source once per cache lifetime. The caller
//! decides that lifetime and can drop the contents with
//! [`ReferenceCache::invalidate`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use sync_core::SyncError;
use sync_store::{bounded, ChangeSource, ReferenceQuery};
use tracing::{debug, info};

/// A reference lookup declared on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    /// Record field holding the lookup key.
    pub field: String,
    /// Projected field receiving the looked-up value.
    pub target_field: String,
    pub table: String,
    pub key_column: String,
    pub value_column: String,
}

impl Lookup {
    pub fn query(&self) -> ReferenceQuery {
        ReferenceQuery {
            table: self.table.clone(),
            key_column: self.key_column.clone(),
            value_column: self.value_column.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReferenceCache {
    tables: HashMap<ReferenceQuery, HashMap<String, String>>,
    loaded_at: Option<DateTime<Utc>>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every table `lookups` needs that is not cached yet.
    pub async fn ensure_loaded<S: ChangeSource>(
        &mut self,
        source: &S,
        lookups: &[Lookup],
        timeout: Option<Duration>,
    ) -> Result<(), SyncError> {
        for lookup in lookups {
            let query = lookup.query();
            if self.tables.contains_key(&query) {
                continue;
            }
            let operation = format!("load reference table {}", query.table);
            let table = bounded(&operation, timeout, source.load_reference(&query)).await?;
            info!(
                "Loaded {} reference entries from {}.{}",
                table.len(),
                query.table,
                query.value_column
            );
            self.tables.insert(query, table);
            self.loaded_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Value for `key`, if the table is loaded and holds it.
    pub fn get(&self, query: &ReferenceQuery, key: &str) -> Option<&str> {
        self.tables
            .get(query)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }

    pub fn is_loaded(&self, query: &ReferenceQuery) -> bool {
        self.tables.contains_key(query)
    }

    /// When the most recent table was loaded.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Drop every cached table; the next pass reloads them.
    pub fn invalidate(&mut self) {
        debug!("Invalidating {} cached reference tables", self.tables.len());
        self.tables.clear();
        self.loaded_at = None;
    }
}
