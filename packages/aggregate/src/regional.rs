//! Per-region aggregation of normalized case records.
//!
//! Counting is plain addition, so partial aggregates over disjoint record
//! batches can be combined with [`RegionalAggregates::merge`] in any order
//! and produce the same result as a single pass.

use std::collections::BTreeMap;

use epi_risk_case_models::{CaseRecord, RegionalAggregate};

/// One [`RegionalAggregate`] per distinct region key, ordered by key.
///
/// Region keys are used verbatim. The empty key is a group of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionalAggregates {
    by_region: BTreeMap<String, RegionalAggregate>,
}

impl RegionalAggregates {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            by_region: BTreeMap::new(),
        }
    }

    /// Counts one record into its region's aggregate.
    pub fn add(&mut self, record: &CaseRecord) {
        self.by_region
            .entry(record.region.clone())
            .or_insert_with(|| RegionalAggregate::new(record.region.clone()))
            .add(record.status, record.gender);
    }

    /// Folds another partial result into this one.
    pub fn merge(&mut self, other: &Self) {
        for (region, agg) in &other.by_region {
            self.by_region
                .entry(region.clone())
                .or_insert_with(|| RegionalAggregate::new(region.clone()))
                .merge(agg);
        }
    }

    /// Looks up the aggregate for an exact region key.
    #[must_use]
    pub fn get(&self, region: &str) -> Option<&RegionalAggregate> {
        self.by_region.get(region)
    }

    /// Number of distinct regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_region.len()
    }

    /// Returns `true` if no records have been counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_region.is_empty()
    }

    /// Iterates aggregates in region-key order.
    pub fn iter(&self) -> impl Iterator<Item = &RegionalAggregate> {
        self.by_region.values()
    }

    /// Sum of `total` across every region.
    #[must_use]
    pub fn total_cases(&self) -> u64 {
        self.iter().map(|agg| agg.total).sum()
    }

    /// Consumes the set, returning aggregates in region-key order.
    #[must_use]
    pub fn into_vec(self) -> Vec<RegionalAggregate> {
        self.by_region.into_values().collect()
    }
}

impl<'a> FromIterator<&'a CaseRecord> for RegionalAggregates {
    fn from_iter<I: IntoIterator<Item = &'a CaseRecord>>(iter: I) -> Self {
        let mut aggregates = Self::new();
        for record in iter {
            aggregates.add(record);
        }
        aggregates
    }
}

/// Groups records by region and counts statuses, genders and totals.
///
/// Empty input yields an empty set.
#[must_use]
pub fn aggregate_by_region(records: &[CaseRecord]) -> RegionalAggregates {
    let aggregates: RegionalAggregates = records.iter().collect();

    log::info!(
        "Aggregated {} records into {} regions",
        records.len(),
        aggregates.len()
    );

    aggregates
}
