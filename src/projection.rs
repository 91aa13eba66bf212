//! Field projection from a source record to the destination payload.

use crate::reference::{Lookup, ReferenceCache};
use std::collections::HashSet;
use sync_core::{ChangeRecord, FieldValue};
use sync_store::ProjectedFields;

/// Selects the fields written for each record.
///
/// With explicit payload columns only those are written, missing ones as
/// null. Without them every field except the natural keys and the
/// modification timestamp is written. Lookup targets are added last.
#[derive(Debug, Clone)]
pub struct Projector {
    payload_columns: Vec<String>,
    excluded: HashSet<String>,
    lookups: Vec<Lookup>,
}

impl Projector {
    pub fn new(
        payload_columns: Vec<String>,
        natural_keys: &[String],
        modified_field: &str,
        lookups: Vec<Lookup>,
    ) -> Self {
        let mut excluded: HashSet<String> = natural_keys.iter().cloned().collect();
        excluded.insert(modified_field.to_string());
        Self {
            payload_columns,
            excluded,
            lookups,
        }
    }

    pub fn project(&self, record: &ChangeRecord, references: &ReferenceCache) -> ProjectedFields {
        let mut fields = ProjectedFields::new();
        if self.payload_columns.is_empty() {
            for (name, value) in record.fields() {
                if !self.excluded.contains(name) {
                    fields.insert(name.to_string(), value.clone());
                }
            }
        } else {
            for column in &self.payload_columns {
                let value = record.get(column).cloned().unwrap_or(FieldValue::Null);
                fields.insert(column.clone(), value);
            }
        }

        for lookup in &self.lookups {
            let value = record
                .get(&lookup.field)
                .and_then(FieldValue::key_text)
                .and_then(|key| references.get(&lookup.query(), &key))
                .map(FieldValue::from)
                .unwrap_or(FieldValue::Null);
            fields.insert(lookup.target_field.clone(), value);
        }
        fields
    }
}
