//! Per-patient case feed.
//!
//! The feed is a single JSON document:
//!
//! ```json
//! {
//!   "data": { "rawPatientData": [ { "gender": "M", "state": "Kerala", ... } ] },
//!   "lastRefreshed": "2020-05-01T10:15:30.123Z"
//! }
//! ```

use chrono::{DateTime, NaiveDateTime, Timelike as _, Utc};
use epi_risk_case_models::RawCaseRecord;

use crate::{FeedConfig, SourceError, retry};

/// One fetch of the case feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    /// Every patient row in the feed, unnormalized.
    pub records: Vec<RawCaseRecord>,
    /// When the feed says it was last refreshed, to the second.
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Downloads and parses the case feed.
///
/// # Errors
///
/// Returns [`SourceError`] if the download fails or the document does not
/// have the expected shape.
pub async fn fetch_case_feed(
    client: &reqwest::Client,
    config: &FeedConfig,
) -> Result<FeedSnapshot, SourceError> {
    log::info!("Fetching case feed from {}", config.case_feed_url);
    let body = retry::send_json(|| client.get(&config.case_feed_url)).await?;
    let snapshot = parse_case_feed(&body)?;
    log::info!(
        "Case feed has {} records (last refreshed {:?})",
        snapshot.records.len(),
        snapshot.last_refreshed
    );
    Ok(snapshot)
}

/// Extracts patient rows and the refresh timestamp from a feed document.
///
/// A missing `lastRefreshed` is tolerated; a present but unparseable one is
/// an error.
///
/// # Errors
///
/// Returns [`SourceError::Malformed`] if `data.rawPatientData` is missing or
/// not an array, [`SourceError::Json`] if a row is not an object of strings,
/// or [`SourceError::InvalidTimestamp`] for a bad `lastRefreshed`.
pub fn parse_case_feed(body: &serde_json::Value) -> Result<FeedSnapshot, SourceError> {
    let rows = body
        .pointer("/data/rawPatientData")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| SourceError::Malformed {
            message: "missing data.rawPatientData array".to_string(),
        })?;

    let records = rows
        .iter()
        .map(|row| serde_json::from_value::<RawCaseRecord>(row.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let last_refreshed = body
        .get("lastRefreshed")
        .and_then(serde_json::Value::as_str)
        .map(parse_last_refreshed)
        .transpose()?;

    Ok(FeedSnapshot {
        records,
        last_refreshed,
    })
}

/// Parses an ISO-8601 refresh timestamp, dropping fractional seconds.
///
/// Accepts a trailing `Z`, an explicit offset (converted to UTC), or no zone
/// at all (taken as UTC).
///
/// # Errors
///
/// Returns [`SourceError::InvalidTimestamp`] if the value is not a
/// recognizable date-time.
pub fn parse_last_refreshed(value: &str) -> Result<DateTime<Utc>, SourceError> {
    let trimmed = value.trim();

    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
                .map(|naive| naive.and_utc())
        })
        .map_err(|_| SourceError::InvalidTimestamp {
            value: value.to_string(),
        })?;

    parsed
        .with_nanosecond(0)
        .ok_or_else(|| SourceError::InvalidTimestamp {
            value: value.to_string(),
        })
}
