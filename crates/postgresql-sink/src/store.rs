//! PostgreSQL implementation of [`DestinationStore`].

use crate::sql::{
    create_identity_index_sql, create_table_sql, create_watermark_index_sql,
    existing_modified_sql, max_modified_sql, upsert_sql, DestinationTable,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use sync_core::{EntityTag, ExternalIdentity};
use sync_store::{projected_to_json, DestinationStore, ProjectedFields};
use tokio::sync::Mutex;
use tokio_postgres::Client;
use tracing::{debug, info};

pub struct PostgresDestination {
    client: Arc<Mutex<Client>>,
    table: DestinationTable,
}

impl PostgresDestination {
    pub fn new(client: Arc<Mutex<Client>>, table: DestinationTable) -> Self {
        Self { client, table }
    }

    /// Create the destination table and its indexes if missing.
    pub async fn ensure_table(&self) -> Result<()> {
        let client = self.client.lock().await;
        for sql in [
            create_table_sql(&self.table),
            create_identity_index_sql(&self.table),
            create_watermark_index_sql(&self.table),
        ] {
            debug!("Executing: {sql}");
            client
                .batch_execute(&sql)
                .await
                .with_context(|| format!("Failed to prepare destination table {}", self.table.table))?;
        }
        info!("Destination table {} is ready", self.table.table);
        Ok(())
    }
}

#[async_trait::async_trait]
impl DestinationStore for PostgresDestination {
    async fn max_modified_at(&self, entity_tag: &EntityTag) -> Result<Option<DateTime<Utc>>> {
        let client = self.client.lock().await;
        let row = client
            .query_one(&max_modified_sql(&self.table), &[&entity_tag.as_str()])
            .await
            .context("Failed to read destination watermark")?;
        Ok(row.try_get::<_, Option<DateTime<Utc>>>(0)?)
    }

    async fn existing_modified_at(
        &self,
        entity_tag: &EntityTag,
        identity: &ExternalIdentity,
    ) -> Result<Option<DateTime<Utc>>> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                &existing_modified_sql(&self.table),
                &[&entity_tag.as_str(), &identity.as_str()],
            )
            .await
            .with_context(|| format!("Failed to look up {identity}"))?;
        match row {
            Some(row) => Ok(Some(row.try_get::<_, DateTime<Utc>>(0)?)),
            None => Ok(None),
        }
    }

    async fn upsert(
        &self,
        entity_tag: &EntityTag,
        identity: &ExternalIdentity,
        fields: &ProjectedFields,
        modified_at: DateTime<Utc>,
    ) -> Result<()> {
        let payload = projected_to_json(fields);
        let client = self.client.lock().await;
        client
            .execute(
                &upsert_sql(&self.table),
                &[&entity_tag.as_str(), &identity.as_str(), &modified_at, &payload],
            )
            .await
            .with_context(|| format!("Failed to upsert {identity}"))?;
        Ok(())
    }
}
