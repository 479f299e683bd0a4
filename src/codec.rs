//! Text encoding helpers shared by the BRIT line formats

use chrono::{DateTime, Utc};

/// Sentinel written wherever an optional value is absent
pub const NOT_PRESENT: &str = "not-present";

/// Epoch millis, or the sentinel
pub fn format_optional_date(date: Option<&DateTime<Utc>>) -> String {
    match date {
        Some(date) => date.timestamp_millis().to_string(),
        None => NOT_PRESENT.to_string(),
    }
}

/// Inverse of [`format_optional_date`]; returns a description of the problem on failure
pub fn parse_optional_date(field: &str) -> Result<Option<DateTime<Utc>>, String> {
    let field = field.trim();
    if field == NOT_PRESENT {
        return Ok(None);
    }
    let millis: i64 = field
        .parse()
        .map_err(|_| format!("'{}' is neither epoch millis nor '{}'", field, NOT_PRESENT))?;
    DateTime::from_timestamp_millis(millis)
        .map(Some)
        .ok_or_else(|| format!("epoch millis {} out of range", millis))
}
