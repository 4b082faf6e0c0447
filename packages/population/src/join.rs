//! Left join of regional aggregates with the population table.

use std::collections::BTreeMap;

use epi_risk_case_models::{RegionalAggregate, UNKNOWN_REGION};
use epi_risk_population_models::{JoinConfig, PopulatedAggregate, PopulationRow};

use crate::names::RegionNames;
use crate::ratio::infected_fraction;

/// Population per normalized region name.
///
/// Built by summing every source row whose name normalizes to the same
/// region, so district-level rows roll up into their state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationTable {
    by_region: BTreeMap<String, u64>,
}

impl PopulationTable {
    /// Population for a normalized region name.
    #[must_use]
    pub fn get(&self, region: &str) -> Option<u64> {
        self.by_region.get(region).copied()
    }

    /// Number of distinct regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_region.len()
    }

    /// Returns `true` if the table has no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_region.is_empty()
    }
}

/// Something the join could not resolve. None of these abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinWarning {
    /// No population row and no override matched the region, so it will be
    /// left out of the risk ranking.
    MissingPopulation {
        /// Normalized region name.
        region: String,
    },
}

/// Output of [`PopulationJoiner::join`].
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    /// One row per normalized region, in name order. The placeholder row for
    /// records without a region, if any, comes last.
    pub rows: Vec<PopulatedAggregate>,
    /// Regions the join could not resolve.
    pub warnings: Vec<JoinWarning>,
}

impl Joined {
    /// Regions that ended up without a population.
    pub fn missing_population(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().map(|w| match w {
            JoinWarning::MissingPopulation { region } => region.as_str(),
        })
    }
}

/// Joins [`RegionalAggregate`]s with population figures.
#[derive(Debug, Clone, Default)]
pub struct PopulationJoiner {
    names: RegionNames,
    overrides: BTreeMap<String, u64>,
}

impl PopulationJoiner {
    /// Creates a joiner from its rename and override tables.
    #[must_use]
    pub fn new(config: &JoinConfig) -> Self {
        let names = RegionNames::new(&config.renames);
        let overrides = config
            .overrides
            .iter()
            .map(|(region, population)| (names.normalize(region), *population))
            .collect();
        Self { names, overrides }
    }

    /// The normalizer used for both sides of the join.
    #[must_use]
    pub const fn names(&self) -> &RegionNames {
        &self.names
    }

    /// Rolls raw population rows up to normalized region names.
    #[must_use]
    pub fn table(&self, rows: &[PopulationRow]) -> PopulationTable {
        let mut by_region: BTreeMap<String, u64> = BTreeMap::new();
        for row in rows {
            *by_region.entry(self.names.normalize(&row.region)).or_default() += row.population;
        }

        log::debug!(
            "Rolled {} population rows up to {} regions",
            rows.len(),
            by_region.len()
        );

        PopulationTable { by_region }
    }

    /// Left-joins aggregates with `table`.
    ///
    /// Aggregates whose keys normalize to the same name are merged into one
    /// row. Keys that normalize to nothing (empty or all whitespace) are
    /// relabelled [`UNKNOWN_REGION`] and kept apart from any region the
    /// source actually named `"Unknown"`; that row is never given a
    /// population. Overrides replace joined values but only for regions that
    /// are present in `aggregates`.
    #[must_use]
    pub fn join<'a, I>(&self, aggregates: I, table: &PopulationTable) -> Joined
    where
        I: IntoIterator<Item = &'a RegionalAggregate>,
    {
        let mut by_region: BTreeMap<String, RegionalAggregate> = BTreeMap::new();
        let mut unlabelled: Option<RegionalAggregate> = None;

        for agg in aggregates {
            let name = self.names.normalize(&agg.region);
            if name.is_empty() {
                unlabelled
                    .get_or_insert_with(|| RegionalAggregate::new(UNKNOWN_REGION))
                    .merge(agg);
                continue;
            }
            by_region
                .entry(name.clone())
                .or_insert_with(|| RegionalAggregate::new(name))
                .merge(agg);
        }

        let mut rows = Vec::with_capacity(by_region.len() + 1);
        let mut warnings = Vec::new();

        for (name, aggregate) in by_region {
            let population = self
                .overrides
                .get(&name)
                .copied()
                .or_else(|| table.get(&name));
            if population.is_none() {
                log::warn!("No population for region {name:?}; excluding it from ranking");
                warnings.push(JoinWarning::MissingPopulation {
                    region: name.clone(),
                });
            }
            rows.push(populate(aggregate, population));
        }

        if let Some(aggregate) = unlabelled {
            log::warn!(
                "{} records have no region; kept as {UNKNOWN_REGION:?} without population",
                aggregate.total
            );
            warnings.push(JoinWarning::MissingPopulation {
                region: UNKNOWN_REGION.to_string(),
            });
            rows.push(populate(aggregate, None));
        }

        log::info!(
            "Joined {} regions with population ({} missing)",
            rows.len(),
            warnings.len()
        );

        Joined { rows, warnings }
    }
}

fn populate(aggregate: RegionalAggregate, population: Option<u64>) -> PopulatedAggregate {
    let infected_fraction = infected_fraction(aggregate.total, population);
    PopulatedAggregate {
        aggregate,
        population: population.filter(|_| infected_fraction.is_some()),
        infected_fraction,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use epi_risk_case_models::{CaseStatus, Gender};

    use super::*;

    fn aggregate(region: &str, total: u64) -> RegionalAggregate {
        let mut agg = RegionalAggregate::new(region);
        for _ in 0..total {
            agg.add(CaseStatus::Active, Gender::Unknown);
        }
        agg
    }

    fn config() -> JoinConfig {
        JoinConfig {
            renames: BTreeMap::from([("Pondicherry".to_string(), "Puducherry".to_string())]),
            overrides: BTreeMap::from([
                ("Delhi".to_string(), 16_787_941),
                ("Ladakh".to_string(), 133_487),
            ]),
        }
    }

    fn census() -> Vec<PopulationRow> {
        vec![
            PopulationRow::new("KERALA", 1_000),
            PopulationRow::new("KERALA", 2_000),
            PopulationRow::new("PONDICHERRY", 500),
            PopulationRow::new("NCT OF DELHI", 99),
        ]
    }

    #[test]
    fn table_sums_rows_per_region() {
        let joiner = PopulationJoiner::new(&config());
        let table = joiner.table(&census());
        assert_eq!(table.get("Kerala"), Some(3_000));
        assert_eq!(table.get("Puducherry"), Some(500));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn renamed_region_joins_into_single_row() {
        let joiner = PopulationJoiner::new(&config());
        let table = joiner.table(&census());
        let aggregates = [aggregate("Puducherry", 5)];

        let joined = joiner.join(&aggregates, &table);

        let puducherry: Vec<_> = joined
            .rows
            .iter()
            .filter(|r| r.region().contains("cherry"))
            .collect();
        assert_eq!(puducherry.len(), 1);
        assert_eq!(puducherry[0].region(), "Puducherry");
        assert_eq!(puducherry[0].population, Some(500));
        assert_relative_eq!(puducherry[0].infected_fraction.unwrap(), 0.01);
    }

    #[test]
    fn case_variants_merge_into_one_region() {
        let joiner = PopulationJoiner::new(&config());
        let table = joiner.table(&census());
        let aggregates = [aggregate("kerala", 2), aggregate("Kerala", 4)];

        let joined = joiner.join(&aggregates, &table);

        assert_eq!(joined.rows.len(), 1);
        assert_eq!(joined.rows[0].aggregate.total, 6);
        assert_eq!(joined.rows[0].population, Some(3_000));
    }

    #[test]
    fn missing_population_stays_null() {
        let joiner = PopulationJoiner::new(&config());
        let table = joiner.table(&census());
        let aggregates = [aggregate("Assam", 10)];

        let joined = joiner.join(&aggregates, &table);

        assert_eq!(joined.rows[0].population, None);
        assert_eq!(joined.rows[0].infected_fraction, None);
        assert_eq!(joined.missing_population().collect::<Vec<_>>(), ["Assam"]);
    }

    #[test]
    fn overrides_win_over_joined_values() {
        let joiner = PopulationJoiner::new(&config());
        let table = joiner.table(&[PopulationRow::new("Delhi", 42)]);
        let aggregates = [aggregate("Delhi", 10)];

        let joined = joiner.join(&aggregates, &table);

        assert_eq!(joined.rows[0].population, Some(16_787_941));
        assert!(joined.warnings.is_empty());
    }

    #[test]
    fn overrides_do_not_create_rows() {
        let joiner = PopulationJoiner::new(&config());
        let table = joiner.table(&census());
        let aggregates = [aggregate("Kerala", 1)];

        let joined = joiner.join(&aggregates, &table);

        assert!(joined.rows.iter().all(|r| r.region() != "Ladakh"));
    }

    #[test]
    fn empty_region_becomes_placeholder_apart_from_named_unknown() {
        let joiner = PopulationJoiner::new(&config());
        let table = joiner.table(&[PopulationRow::new("Unknown", 1_000)]);
        let aggregates = [aggregate("", 3), aggregate("Unknown", 2)];

        let joined = joiner.join(&aggregates, &table);

        assert_eq!(joined.rows.len(), 2);
        let named = &joined.rows[0];
        assert_eq!(named.region(), UNKNOWN_REGION);
        assert_eq!(named.aggregate.total, 2);
        assert_eq!(named.population, Some(1_000));

        let placeholder = &joined.rows[1];
        assert_eq!(placeholder.region(), UNKNOWN_REGION);
        assert_eq!(placeholder.aggregate.total, 3);
        assert_eq!(placeholder.population, None);
    }

    #[test]
    fn blank_regions_share_the_placeholder() {
        let joiner = PopulationJoiner::new(&config());
        let aggregates = [aggregate("   ", 1), aggregate("\t", 2), aggregate("", 3)];

        let joined = joiner.join(&aggregates, &PopulationTable::default());

        let names: Vec<_> = joined.rows.iter().map(PopulatedAggregate::region).collect();
        assert_eq!(names, [UNKNOWN_REGION]);
        assert_eq!(joined.rows[0].aggregate.total, 6);
        assert_eq!(joined.missing_population().collect::<Vec<_>>(), [UNKNOWN_REGION]);
    }

    #[test]
    fn join_is_idempotent() {
        let joiner = PopulationJoiner::new(&config());
        let table = joiner.table(&census());
        let aggregates = [
            aggregate("KERALA", 3),
            aggregate("Pondicherry", 1),
            aggregate("Assam", 2),
        ];

        let first = joiner.join(&aggregates, &table);
        let second = joiner.join(&aggregates, &table);
        assert_eq!(first, second);

        let rejoined = joiner.join(first.rows.iter().map(|r| &r.aggregate), &table);
        assert_eq!(rejoined.rows, first.rows);
    }
}
