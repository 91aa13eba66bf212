//! PostgreSQL implementation of [`ChangeSource`].

use crate::query::{build_extract_query, build_reference_query, SourceTable};
use crate::value::{convert_postgres_value, row_to_record};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use sync_core::ChangeRecord;
use sync_store::{ChangeSource, ReferenceQuery};
use tokio::sync::Mutex;
use tokio_postgres::types::Type;
use tokio_postgres::Client;
use tracing::{debug, info, warn};
use watermark_sync_postgresql::utc_to_local;

/// Change source reading one entity table.
pub struct PostgresChangeSource {
    client: Arc<Mutex<Client>>,
    table: SourceTable,
    /// Zone used to read and compare `timestamp without time zone` columns.
    timezone: Tz,
}

impl PostgresChangeSource {
    pub fn new(client: Arc<Mutex<Client>>, table: SourceTable, timezone: Tz) -> Self {
        Self {
            client,
            table,
            timezone,
        }
    }
}

#[async_trait::async_trait]
impl ChangeSource for PostgresChangeSource {
    async fn extract(&self, start_boundary: DateTime<Utc>) -> Result<Vec<ChangeRecord>> {
        let sql = build_extract_query(&self.table);
        debug!("Extracting changes with: {sql}");

        let client = self.client.lock().await;
        let statement = client
            .prepare(&sql)
            .await
            .with_context(|| format!("Failed to prepare extraction query on {}", self.table.table))?;

        // The boundary parameter must match the modification column's type.
        let param_type = statement
            .params()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Extraction query has no boundary parameter"))?;
        let rows = match param_type {
            Type::TIMESTAMPTZ => client.query(&statement, &[&start_boundary]).await,
            Type::TIMESTAMP => {
                let local = utc_to_local(start_boundary, &self.timezone);
                client.query(&statement, &[&local]).await
            }
            Type::DATE => {
                let local = utc_to_local(start_boundary, &self.timezone).date();
                client.query(&statement, &[&local]).await
            }
            other => {
                return Err(anyhow!(
                    "Modification column '{}' has type '{other}', expected timestamp, timestamptz or date",
                    self.table.modified_column
                ))
            }
        }
        .with_context(|| format!("Failed to extract changes from {}", self.table.table))?;

        let records: Vec<ChangeRecord> = rows
            .iter()
            .map(|row| row_to_record(row, &self.timezone))
            .collect();

        info!(
            "Extracted {} changed rows from {} since {}",
            records.len(),
            self.table.table,
            start_boundary
        );
        Ok(records)
    }

    async fn load_reference(&self, query: &ReferenceQuery) -> Result<HashMap<String, String>> {
        let sql = build_reference_query(self.table.schema.as_deref(), query);
        let client = self.client.lock().await;
        let rows = client
            .query(&sql, &[])
            .await
            .with_context(|| format!("Failed to load reference table {}", query.table))?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            // Keys use the same rendering as record fields so lookups match.
            let key = match convert_postgres_value(&row, 0, &self.timezone) {
                Ok(key) => key.key_text(),
                Err(e) => {
                    warn!("Skipping reference row in {}: {e:#}", query.table);
                    continue;
                }
            };
            let value: Option<String> = row.try_get(1)?;
            if let (Some(key), Some(value)) = (key, value) {
                map.insert(key, value);
            }
        }
        debug!("Loaded {} entries from {}", map.len(), query.table);
        Ok(map)
    }
}
