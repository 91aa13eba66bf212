//! Shared PostgreSQL utilities for watermark-sync
//!
//! Connection setup, identifier quoting and time zone handling used by both
//! the PostgreSQL change source and the PostgreSQL destination.

mod client;
mod ident;
mod time;

pub use client::{new_postgresql_client, APPLICATION_NAME};
pub use ident::{qualified_table, quote_ident};
pub use time::{local_to_utc, parse_timezone, utc_to_local};
