//! Extraction and reference query construction.

use sync_store::ReferenceQuery;
use watermark_sync_postgresql::{qualified_table, quote_ident};

/// Static description of the source table for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    /// Schema holding the table; `None` uses the connection's search path.
    pub schema: Option<String>,
    pub table: String,
    /// Columns to select. Empty selects every column.
    pub columns: Vec<String>,
    /// Column holding the last-modification timestamp.
    pub modified_column: String,
    /// Fixed domain-exclusion predicate, e.g. `category <> 'internal'`.
    pub exclusion_predicate: Option<String>,
}

/// Build the parameterized extraction statement. `$1` is the start boundary.
///
/// No LIMIT: a partial window would let the next pass's watermark advance
/// past rows that were never processed.
pub fn build_extract_query(source: &SourceTable) -> String {
    let modified = quote_ident(&source.modified_column);
    let projection = if source.columns.is_empty() {
        "*".to_string()
    } else {
        source
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut sql = format!(
        "SELECT {projection} FROM {} WHERE {modified} >= $1 AND {modified} IS NOT NULL",
        qualified_table(source.schema.as_deref(), &source.table)
    );
    if let Some(predicate) = source
        .exclusion_predicate
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        sql.push_str(&format!(" AND ({predicate})"));
    }
    sql.push_str(&format!(" ORDER BY {modified} ASC"));
    sql
}

/// Build the statement loading a reference table. The key keeps its column
/// type so it renders like the record field it is matched against.
pub fn build_reference_query(schema: Option<&str>, query: &ReferenceQuery) -> String {
    format!(
        "SELECT {}, {}::text FROM {}",
        quote_ident(&query.key_column),
        quote_ident(&query.value_column),
        qualified_table(schema, &query.table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activities() -> SourceTable {
        SourceTable {
            schema: Some("ops".into()),
            table: "service_activities".into(),
            columns: vec!["ticket".into(), "task".into(), "modified_at".into()],
            modified_column: "modified_at".into(),
            exclusion_predicate: None,
        }
    }

    #[test]
    fn test_extract_query_shape() {
        assert_eq!(
            build_extract_query(&activities()),
            "SELECT \"ticket\", \"task\", \"modified_at\" FROM \"ops\".\"service_activities\" \
             WHERE \"modified_at\" >= $1 AND \"modified_at\" IS NOT NULL \
             ORDER BY \"modified_at\" ASC"
        );
    }

    #[test]
    fn test_extract_query_with_exclusion_and_all_columns() {
        let source = SourceTable {
            schema: None,
            columns: vec![],
            exclusion_predicate: Some(" category <> 'internal' ".into()),
            ..activities()
        };
        let sql = build_extract_query(&source);
        assert!(sql.starts_with("SELECT * FROM \"service_activities\""));
        assert!(sql.contains("AND (category <> 'internal') ORDER BY"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_blank_exclusion_is_ignored() {
        let source = SourceTable {
            exclusion_predicate: Some("   ".into()),
            ..activities()
        };
        assert!(!build_extract_query(&source).contains("AND ()"));
    }

    #[test]
    fn test_reference_query() {
        let query = ReferenceQuery {
            table: "technicians".into(),
            key_column: "id".into(),
            value_column: "full_name".into(),
        };
        assert_eq!(
            build_reference_query(Some("ops"), &query),
            "SELECT \"id\", \"full_name\"::text FROM \"ops\".\"technicians\""
        );
    }
}
