#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Regional risk ranking.
//!
//! Regions with a known population are turned into a feature matrix, each
//! column is scaled to unit variance, and the rows are clustered with Ward
//! linkage. The dendrogram is cut into at most k flat clusters and each
//! cluster label becomes an alert level with a matching spread probability.

pub mod cut;
pub mod features;
pub mod linkage;
pub mod rank;

pub use cut::maxclust;
pub use features::{FEATURE_COLUMNS, complete_rows, feature_matrix, whiten};
pub use linkage::{Merge, ward_linkage};
pub use rank::{rank_regions, spread_probability};

/// Errors that can occur while ranking regions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RankError {
    /// Too few regions survived null filtering to build a hierarchy.
    #[error("Insufficient data: {regions} region(s) with known population, need at least 2")]
    InsufficientData {
        /// Number of complete rows.
        regions: usize,
    },

    /// The feature matrix could not be built from the joined rows.
    #[error("Invalid feature matrix for region {region:?}: {message}")]
    InvalidFeatureMatrix {
        /// Offending region, empty if the failure is not row-specific.
        region: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The requested number of flat clusters is zero.
    #[error("Invalid cluster count: {clusters}")]
    InvalidClusterCount {
        /// Requested cluster count.
        clusters: usize,
    },
}
