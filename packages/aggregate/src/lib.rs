#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case record normalization and per-region aggregation.
//!
//! [`normalize`] maps the feed's free-text status and gender fields onto the
//! closed enums in [`epi_risk_case_models`], and [`regional`] folds the
//! normalized records into one [`RegionalAggregate`] per region key.
//!
//! [`RegionalAggregate`]: epi_risk_case_models::RegionalAggregate

pub mod normalize;
pub mod regional;

pub use normalize::{normalize_gender, normalize_record, normalize_records, normalize_status};
pub use regional::{RegionalAggregates, aggregate_by_region};

/// Errors that can occur while normalizing case records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    /// A status value outside `Active`, `Deceased`, `Migrated`, `Recovered`
    /// (after folding `Hospitalized` into `Active`).
    #[error("Unrecognized case status {value:?}")]
    UnrecognizedStatus {
        /// The raw status string.
        value: String,
    },

    /// A gender value that is neither blank nor one of the known genders.
    #[error("Unrecognized gender {value:?}")]
    UnrecognizedGender {
        /// The raw gender string.
        value: String,
    },

    /// A record in a batch failed to normalize.
    #[error("Record {index}: {source}")]
    Record {
        /// Zero-based position of the record in the input batch.
        index: usize,
        /// What was wrong with it.
        #[source]
        source: Box<Self>,
    },
}
