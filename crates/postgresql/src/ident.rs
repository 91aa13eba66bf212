//! SQL identifier quoting.
//!
//! Table and column names come from operator configuration and are spliced
//! into statements, so they are always emitted as quoted identifiers.

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote `schema.table`, or just `table` when no schema is given.
pub fn qualified_table(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(table)),
        None => quote_ident(table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("modified_at"), "\"modified_at\"");
        assert_eq!(quote_ident("Odd\"Name"), "\"Odd\"\"Name\"");
    }

    #[test]
    fn test_qualified_table() {
        assert_eq!(
            qualified_table(Some("ops"), "activities"),
            "\"ops\".\"activities\""
        );
        assert_eq!(qualified_table(None, "activities"), "\"activities\"");
    }
}
