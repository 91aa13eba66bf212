//! Time zone handling for `timestamp without time zone` columns.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse an IANA time zone name such as `"Europe/Madrid"` or `"UTC"`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>().map_err(|_| {
        anyhow!("Invalid timezone: {name}. Use IANA timezone names like 'America/New_York', 'UTC'")
    })
}

/// Interpret a naive source timestamp as local time in `tz`.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant;
/// local times skipped by a DST gap are an error.
pub fn local_to_utc(naive: NaiveDateTime, tz: &Tz) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("Local time {naive} does not exist in timezone {tz}"))
}

/// Render a UTC instant as naive local time in `tz`, for comparing against
/// `timestamp without time zone` columns.
pub fn utc_to_local(instant: DateTime<Utc>, tz: &Tz) -> NaiveDateTime {
    instant.with_timezone(tz).naive_local()
}
