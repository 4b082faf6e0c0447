#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Row types as stored in and read back from the regions store.
//!
//! Distinct from the in-memory [`RegionalAggregate`] by the `last_updated`
//! stamp the store adds on every upsert, and by a flag marking the row that
//! collects records without a region.

use chrono::{DateTime, Utc};
use epi_risk_case_models::RegionalAggregate;
use serde::{Deserialize, Serialize};

/// One persisted region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRegion {
    /// Counts for the region. The key is never blank once stored.
    #[serde(flatten)]
    pub aggregate: RegionalAggregate,
    /// `true` for the placeholder row holding records that named no region.
    /// It shares its key with any region the feed itself calls `"Unknown"`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unlabelled: bool,
    /// When the row was last written.
    pub last_updated: DateTime<Utc>,
}

impl StoredRegion {
    /// Region key.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.aggregate.region
    }
}
