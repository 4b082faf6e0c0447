#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Retrieval of the two upstream inputs: the per-patient case feed (JSON)
//! and the population reference table (CSV).
//!
//! Fetching and parsing are split so the parsers can be driven from files
//! or fixtures without touching the network.

pub mod case_feed;
pub mod population_csv;
pub mod progress;
pub mod retry;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use case_feed::{FeedSnapshot, fetch_case_feed, parse_case_feed, parse_last_refreshed};
pub use population_csv::{fetch_population, parse_population_csv};

/// Errors that can occur while fetching or parsing upstream data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing failed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// The payload parsed but did not have the expected shape.
    #[error("Malformed payload: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },

    /// A timestamp could not be parsed.
    #[error("Invalid timestamp: {value:?}")]
    InvalidTimestamp {
        /// The raw value.
        value: String,
    },
}

/// Where and how to fetch the upstream inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedConfig {
    /// URL of the per-patient case feed.
    pub case_feed_url: String,
    /// URL of the population CSV.
    pub population_csv_url: String,
    /// Header of the CSV column holding the region name.
    #[serde(default = "default_region_column")]
    pub region_column: String,
    /// Header of the CSV column holding the head count.
    #[serde(default = "default_population_column")]
    pub population_column: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_region_column() -> String {
    "State name".to_string()
}

fn default_population_column() -> String {
    "Population".to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

impl FeedConfig {
    /// Builds an HTTP client honoring the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the TLS backend cannot be
    /// initialized.
    pub fn client(&self) -> Result<reqwest::Client, SourceError> {
        Ok(reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?)
    }
}
