//! PostgreSQL destination store for watermark-sync
//!
//! Rows are keyed by `(entity_tag, external_id)` and carry the source-side
//! `modified_at` alongside a JSONB payload of projected fields. The watermark
//! for an entity kind is `MAX(modified_at)` over its rows.

mod sql;
mod store;

pub use sql::{
    create_identity_index_sql, create_table_sql, create_watermark_index_sql,
    existing_modified_sql, max_modified_sql, upsert_sql, DestinationTable,
};
pub use store::PostgresDestination;

/// PostgreSQL destination connection options
#[derive(Clone, Debug)]
pub struct DestinationOpts {
    /// PostgreSQL connection URI
    pub destination_uri: String,
}

/// Connect and build a destination store for `table`.
pub async fn connect(
    opts: &DestinationOpts,
    table: DestinationTable,
) -> anyhow::Result<PostgresDestination> {
    let client = watermark_sync_postgresql::new_postgresql_client(&opts.destination_uri).await?;
    Ok(PostgresDestination::new(client, table))
}
