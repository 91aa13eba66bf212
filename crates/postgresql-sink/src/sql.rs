//! Statements against the destination table.
//!
//! The table is keyed by `(entity_tag, external_id)`; several entity kinds
//! may share one table and are kept apart by the tag column.

use watermark_sync_postgresql::{qualified_table, quote_ident};

/// Location of the destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTable {
    pub schema: Option<String>,
    pub table: String,
}

impl DestinationTable {
    pub fn new(schema: Option<String>, table: impl Into<String>) -> Self {
        Self {
            schema,
            table: table.into(),
        }
    }

    fn qualified(&self) -> String {
        qualified_table(self.schema.as_deref(), &self.table)
    }
}

pub fn create_table_sql(table: &DestinationTable) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  \"entity_tag\" TEXT NOT NULL,\n  \"external_id\" TEXT NOT NULL,\n  \"modified_at\" TIMESTAMPTZ NOT NULL,\n  \"payload\" JSONB NOT NULL,\n  \"synced_at\" TIMESTAMPTZ NOT NULL DEFAULT now()\n);",
        table.qualified()
    )
}

/// Unique index backing upsert-by-identity.
pub fn create_identity_index_sql(table: &DestinationTable) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} (\"entity_tag\", \"external_id\");",
        quote_ident(&format!("{}_identity_idx", table.table)),
        table.qualified()
    )
}

/// Index serving the per-tag watermark query.
pub fn create_watermark_index_sql(table: &DestinationTable) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} (\"entity_tag\", \"modified_at\");",
        quote_ident(&format!("{}_watermark_idx", table.table)),
        table.qualified()
    )
}

/// `$1` is the entity tag.
pub fn max_modified_sql(table: &DestinationTable) -> String {
    format!(
        "SELECT MAX(\"modified_at\") FROM {} WHERE \"entity_tag\" = $1",
        table.qualified()
    )
}

/// `$1` is the entity tag, `$2` the external id.
pub fn existing_modified_sql(table: &DestinationTable) -> String {
    format!(
        "SELECT \"modified_at\" FROM {} WHERE \"entity_tag\" = $1 AND \"external_id\" = $2",
        table.qualified()
    )
}

/// `$1` tag, `$2` external id, `$3` modified_at, `$4` payload.
pub fn upsert_sql(table: &DestinationTable) -> String {
    format!(
        "INSERT INTO {} (\"entity_tag\", \"external_id\", \"modified_at\", \"payload\", \"synced_at\") \
         VALUES ($1, $2, $3, $4, now()) \
         ON CONFLICT (\"entity_tag\", \"external_id\") DO UPDATE SET \
         \"modified_at\" = EXCLUDED.\"modified_at\", \
         \"payload\" = EXCLUDED.\"payload\", \
         \"synced_at\" = EXCLUDED.\"synced_at\"",
        table.qualified()
    )
}
