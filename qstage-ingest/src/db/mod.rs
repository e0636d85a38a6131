//! Database operations for the staging pipeline
//!
//! One module per table. Timestamps are stored as RFC3339 strings and
//! parsed back on load; status columns round-trip through the model enums
//! so unknown strings surface as errors instead of leaking through.

pub mod batches;
pub mod duplicates;
pub mod questions;
pub mod staged;

use chrono::{DateTime, Utc};
use qstage_common::{Error, Result};
use uuid::Uuid;

fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID in {}: {}", field, e)))
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in {}: {}", field, e)))
}

fn parse_opt_timestamp(value: Option<String>, field: &str) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(&v, field)).transpose()
}
