//! Change records read from the source.

use crate::error::ValidationError;
use crate::values::FieldValue;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A row read from the source as a flat mapping of field name to value.
///
/// Field order is irrelevant for identity and projection: natural keys are
/// resolved in their declared order and payload fields are looked up by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeRecord {
    fields: BTreeMap<String, FieldValue>,
    /// Fields the source failed to convert, with the reason.
    unreadable: Vec<(String, String)>,
}

impl ChangeRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Record a column the source could not convert. The field reads as null
    /// and the record is rejected by [`ChangeRecord::check_readable`].
    pub fn mark_unreadable(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        let name = name.into();
        self.fields.insert(name.clone(), FieldValue::Null);
        self.unreadable.push((name, reason.into()));
    }

    /// Fails with the first unreadable field, if any.
    pub fn check_readable(&self) -> Result<(), ValidationError> {
        match self.unreadable.first() {
            Some((field, reason)) => Err(ValidationError::UnreadableField {
                field: field.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Get a field by name. Returns `None` when the field is absent.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Iterate over all fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Read the modification timestamp from `field`.
    ///
    /// A missing or null timestamp rejects the record before identity resolution.
    pub fn modified_at(&self, field: &str) -> Result<DateTime<Utc>, ValidationError> {
        match self.fields.get(field) {
            None | Some(FieldValue::Null) => Err(ValidationError::MissingModifiedAt {
                field: field.to_string(),
            }),
            Some(FieldValue::Timestamp(ts)) => Ok(*ts),
            Some(other) => Err(ValidationError::InvalidModifiedAt {
                field: field.to_string(),
                kind: other.kind(),
            }),
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for ChangeRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            unreadable: Vec::new(),
        }
    }
}
