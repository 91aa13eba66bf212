//! PostgreSQL change extraction for watermark-sync
//!
//! Reads every row of an entity table whose modification timestamp is at or
//! after the pass's start boundary, in ascending timestamp order. No triggers
//! or audit tables are required; the source only needs an indexed
//! modification-timestamp column.

mod query;
mod source;
mod value;

pub use query::{build_extract_query, build_reference_query, SourceTable};
pub use source::PostgresChangeSource;
pub use value::row_to_record;

/// PostgreSQL source connection options
#[derive(Clone, Debug)]
pub struct SourceOpts {
    /// PostgreSQL connection URI
    pub source_uri: String,
    /// IANA zone for `timestamp without time zone` columns
    pub source_timezone: String,
}

/// Connect and build a change source for `table`.
pub async fn connect(opts: &SourceOpts, table: SourceTable) -> anyhow::Result<PostgresChangeSource> {
    let timezone = watermark_sync_postgresql::parse_timezone(&opts.source_timezone)?;
    let client = watermark_sync_postgresql::new_postgresql_client(&opts.source_uri).await?;
    Ok(PostgresChangeSource::new(client, table, timezone))
}
