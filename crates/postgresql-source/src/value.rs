//! PostgreSQL column to [`FieldValue`] conversion.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use sync_core::{ChangeRecord, FieldValue};
use tokio_postgres::types::Type;
use tokio_postgres::Row;
use tracing::warn;
use watermark_sync_postgresql::local_to_utc;

/// Convert every column of `row` into a [`ChangeRecord`].
///
/// `timestamp` and `date` columns are interpreted as local time in `tz`.
/// A column that cannot be converted is marked unreadable on the record
/// instead of failing the extraction.
pub fn row_to_record(row: &Row, tz: &Tz) -> ChangeRecord {
    record_from_columns(
        row.columns()
            .iter()
            .enumerate()
            .map(|(index, column)| (column.name(), convert_postgres_value(row, index, tz))),
    )
}

fn record_from_columns<'a>(
    columns: impl IntoIterator<Item = (&'a str, Result<FieldValue>)>,
) -> ChangeRecord {
    let mut record = ChangeRecord::new();
    for (name, value) in columns {
        match value {
            Ok(value) => record.insert(name, value),
            Err(e) => {
                warn!("Failed to convert column '{name}': {e:#}");
                record.mark_unreadable(name, format!("{e:#}"));
            }
        }
    }
    record
}

/// Convert a single PostgreSQL value.
pub(crate) fn convert_postgres_value(row: &Row, index: usize, tz: &Tz) -> Result<FieldValue> {
    let column = &row.columns()[index];
    let pg_type = column.type_();

    let value = match *pg_type {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(index)?
            .map(|b| FieldValue::Text(b.to_string())),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(index)?
            .map(|i| FieldValue::Integer(i64::from(i))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(index)?
            .map(|i| FieldValue::Integer(i64::from(i))),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.map(FieldValue::Integer),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(index)?
            .map(|f| float_to_decimal(f64::from(f)))
            .transpose()?,
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(index)?
            .map(float_to_decimal)
            .transpose()?,
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(index)
            .map_err(|e| anyhow!("NUMERIC type conversion failed: {e}"))?
            .map(FieldValue::Decimal),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(index)?.map(FieldValue::Text)
        }
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(index)?
            .map(|ts| local_to_field(ts, tz))
            .transpose()?,
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)?
            .map(FieldValue::Timestamp),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(index)?
            .map(|date| {
                let midnight = date
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| anyhow!("Invalid date"))?;
                local_to_field(midnight, tz)
            })
            .transpose()?,
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(index)?
            .map(|time| FieldValue::Text(time.to_string())),
        Type::UUID => row
            .try_get::<_, Option<uuid::Uuid>>(index)?
            .map(|uuid| FieldValue::Text(uuid.to_string())),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(index)?
            .map(|json| FieldValue::Text(json.to_string())),
        ref other => {
            return Err(anyhow!(
                "Unsupported PostgreSQL type '{other}' for column '{}'",
                column.name()
            ))
        }
    };

    Ok(value.unwrap_or(FieldValue::Null))
}

fn local_to_field(ts: NaiveDateTime, tz: &Tz) -> Result<FieldValue> {
    local_to_utc(ts, tz).map(FieldValue::Timestamp)
}

/// Floats become exact decimals so every numeric payload has one representation.
fn float_to_decimal(f: f64) -> Result<FieldValue> {
    Decimal::try_from(f)
        .map(FieldValue::Decimal)
        .map_err(|e| anyhow!("Float value {f} cannot be represented as a decimal: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_decimal() {
        assert_eq!(
            float_to_decimal(2.5).unwrap(),
            FieldValue::Decimal(Decimal::new(25, 1))
        );
        assert!(float_to_decimal(f64::NAN).is_err());
    }

    #[test]
    fn test_bad_columns_mark_the_record_unreadable() {
        let madrid: Tz = "Europe/Madrid".parse().unwrap();
        // 02:30 on the spring-forward day does not exist in Madrid.
        let gap = NaiveDate::from_ymd_opt(2025, 3, 30)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();

        let record = record_from_columns(vec![
            ("id", Ok(FieldValue::from("C1"))),
            ("rate", float_to_decimal(f64::NAN)),
            ("modified_at", local_to_field(gap, &madrid)),
        ]);

        assert_eq!(record.get("id"), Some(&FieldValue::from("C1")));
        assert!(record.get("rate").unwrap().is_null());
        assert!(record.get("modified_at").unwrap().is_null());
        let err = record.check_readable().unwrap_err();
        assert!(err.to_string().starts_with("field 'rate' could not be read"));
    }

    #[test]
    fn test_convertible_columns_leave_the_record_readable() {
        let record = record_from_columns(vec![
            ("id", Ok(FieldValue::from("C1"))),
            ("rate", float_to_decimal(2.5)),
        ]);
        assert!(record.check_readable().is_ok());
        assert_eq!(record.len(), 2);
    }
}
