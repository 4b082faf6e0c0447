#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Population table rows, join configuration, and population-joined
//! aggregates.

use std::collections::BTreeMap;

use epi_risk_case_models::RegionalAggregate;
use serde::{Deserialize, Serialize};

/// One row of the population reference table.
///
/// Rows are usually finer-grained than regions (one per district), so
/// several rows can share a region name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationRow {
    /// Region name as spelled by the population source.
    pub region: String,
    /// Head count for this row.
    pub population: u64,
}

impl PopulationRow {
    /// Creates a row.
    #[must_use]
    pub fn new(region: impl Into<String>, population: u64) -> Self {
        Self {
            region: region.into(),
            population,
        }
    }
}

/// Tables that steer how case regions are matched to population figures.
///
/// Keys of both maps are compared after region-name normalization, so
/// their spelling and case do not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JoinConfig {
    /// Alternative spellings mapped to the name used for matching
    /// (e.g. `"Pondicherry" -> "Puducherry"`).
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
    /// Populations applied after the join, replacing whatever was matched.
    #[serde(default)]
    pub overrides: BTreeMap<String, u64>,
}

/// A [`RegionalAggregate`] joined with its population.
///
/// `population` and `infected_fraction` are `None` when no population could
/// be found for the region. They are never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedAggregate {
    /// Counts, with `region` replaced by its normalized name.
    #[serde(flatten)]
    pub aggregate: RegionalAggregate,
    /// Region population, if known.
    pub population: Option<u64>,
    /// `total / population`, if the population is known.
    pub infected_fraction: Option<f64>,
}

impl PopulatedAggregate {
    /// Normalized region name.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.aggregate.region
    }

    /// Returns `true` when population (and therefore the ratio) is known.
    #[must_use]
    pub const fn has_population(&self) -> bool {
        self.population.is_some() && self.infected_fraction.is_some()
    }
}
