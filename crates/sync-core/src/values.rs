//! Field values carried by change records.
//!
//! Source adapters convert their native column types into [`FieldValue`];
//! the destination receives projected fields as a JSON object built with
//! [`FieldValue::to_json`].

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// A single value read from the source.
///
/// The value universe is deliberately small: strings, integers, exact
/// decimals and timestamps. Any of them may be null on the source side,
/// which is represented by [`FieldValue::Null`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Text value
    Text(String),

    /// 64-bit signed integer
    Integer(i64),

    /// Exact decimal (NUMERIC/DECIMAL columns)
    Decimal(Decimal),

    /// Point in time, normalized to UTC
    Timestamp(DateTime<Utc>),

    /// SQL NULL
    Null,
}

impl FieldValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Canonical text form shared by identity components and reference keys.
    ///
    /// Text is trimmed, decimals are normalized and timestamps use RFC 3339
    /// with microseconds. Null has no key form.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.trim().to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Decimal(d) => Some(d.normalize().to_string()),
            Self::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Self::Null => None,
        }
    }

    /// Short name of the value kind, used in validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Timestamp(_) => "timestamp",
            Self::Null => "null",
        }
    }

    /// Convert to the JSON representation stored in the destination payload.
    ///
    /// Decimals are written as strings to preserve precision, timestamps as
    /// RFC 3339 with microseconds.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Decimal(d) => serde_json::Value::String(d.normalize().to_string()),
            Self::Timestamp(ts) => {
                serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            Self::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{}", d.normalize()),
            Self::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Self::Null => f.write_str("NULL"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}
