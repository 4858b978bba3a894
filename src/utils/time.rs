//! Instant parsing and rendering.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Parse an ISO-8601 instant.
///
/// Accepts RFC 3339 timestamps (`2024-03-01T13:30:00Z`, `...+00:00`, with or
/// without fractional seconds) and bare dates (`2024-03-01`), which mean
/// midnight UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        Error::MalformedTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;

    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Error::MalformedTimestamp {
            value: value.to_string(),
            reason: "no midnight for date".to_string(),
        })
}

/// Render an instant as RFC 3339 with a `Z` suffix.
///
/// Whole seconds render without a fraction; otherwise only as many
/// sub-second digits as needed (milli, micro or nano) are kept.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// `deserialize_with` adapter for configuration instants.
pub fn deserialize_instant<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).map_err(serde::de::Error::custom)
}
