//! Timestamp columns are stored as RFC 3339 text.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

pub fn to_db(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn opt_to_db(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.as_ref().map(to_db)
}

/// Parse a required timestamp column.
pub fn from_db(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a nullable timestamp column.
pub fn opt_from_db(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| from_db(idx, &s)).transpose()
}
