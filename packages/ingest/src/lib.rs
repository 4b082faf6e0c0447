#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipeline runs tying the feeds, the aggregation core, the risk ranker,
//! and the regions store together.
//!
//! * [`sync_regions`] refreshes the stored per-region counts from the feed.
//! * [`compute_risk`] fetches both inputs and ranks regions on demand.
//! * [`rank_inputs`] is the network-free core of [`compute_risk`].

pub mod config;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use epi_risk_aggregate::{
    AggregateError, RegionalAggregates, aggregate_by_region, normalize_records,
};
use epi_risk_case_models::RawCaseRecord;
use epi_risk_database::DbError;
use epi_risk_population::PopulationJoiner;
use epi_risk_population_models::PopulationRow;
use epi_risk_risk::{RankError, rank_regions};
use epi_risk_risk_models::RiskAssignment;
use epi_risk_source::SourceError;
use epi_risk_source::progress::ProgressCallback;

pub use config::PipelineConfig;

/// Display format for refresh timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Fetching or parsing an upstream feed failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A case record could not be normalized.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Ranking failed.
    #[error(transparent)]
    Rank(#[from] RankError),

    /// The regions store failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Reading a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The pipeline configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Outcome of a [`sync_regions`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    /// Records read from the feed.
    pub records: usize,
    /// Region rows written to the store.
    pub regions: u64,
    /// The feed's own refresh time, if it reported one.
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Normalizes raw feed rows and counts them per region.
///
/// # Errors
///
/// Returns [`IngestError::Aggregate`] on the first record with an
/// unrecognized status or gender.
pub fn build_aggregates(records: &[RawCaseRecord]) -> Result<RegionalAggregates, IngestError> {
    let normalized = normalize_records(records)?;
    Ok(aggregate_by_region(&normalized))
}

/// Ranks regions from already-fetched inputs.
///
/// # Errors
///
/// Returns [`IngestError`] if a record cannot be normalized or ranking
/// fails.
pub fn rank_inputs(
    records: &[RawCaseRecord],
    population: &[PopulationRow],
    config: &PipelineConfig,
) -> Result<Vec<RiskAssignment>, IngestError> {
    let aggregates = build_aggregates(records)?;

    let joiner = PopulationJoiner::new(&config.population);
    let table = joiner.table(population);
    let joined = joiner.join(aggregates.iter(), &table);

    Ok(rank_regions(&joined.rows, &config.ranking)?)
}

/// Fetches the case feed and population table, then ranks regions.
///
/// # Errors
///
/// Returns [`IngestError`] if either fetch fails or ranking fails.
pub async fn compute_risk(config: &PipelineConfig) -> Result<Vec<RiskAssignment>, IngestError> {
    let start = Instant::now();
    let client = config.feeds.client()?;

    let (snapshot, population) = tokio::try_join!(
        epi_risk_source::fetch_case_feed(&client, &config.feeds),
        epi_risk_source::fetch_population(&client, &config.feeds),
    )?;

    let assignments = rank_inputs(&snapshot.records, &population, config)?;

    log::info!(
        "Ranked {} regions in {:.1}s",
        assignments.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(assignments)
}

/// A fetched case feed together with its per-region counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedAggregates {
    /// Records read from the feed.
    pub records: usize,
    /// Per-region counts.
    pub aggregates: RegionalAggregates,
    /// The feed's own refresh time, if it reported one.
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Fetches the case feed and aggregates it per region.
///
/// # Errors
///
/// Returns [`IngestError`] if the fetch or normalization fails.
pub async fn fetch_aggregates(
    config: &PipelineConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<FeedAggregates, IngestError> {
    let progress = progress.unwrap_or_else(epi_risk_source::progress::null_progress);
    progress.set_message("Fetching case feed".to_string());
    let client = config.feeds.client()?;
    let snapshot = epi_risk_source::fetch_case_feed(&client, &config.feeds).await?;
    progress.inc(1);

    progress.set_message(format!("Aggregating {} records", snapshot.records.len()));
    let aggregates = build_aggregates(&snapshot.records)?;
    progress.inc(1);

    Ok(FeedAggregates {
        records: snapshot.records.len(),
        aggregates,
        last_refreshed: snapshot.last_refreshed,
    })
}

/// Fetches the case feed, aggregates it, and upserts every region into the
/// store.
///
/// # Errors
///
/// Returns [`IngestError`] if the fetch, normalization, or any write fails.
pub async fn sync_regions(
    conn: &duckdb::Connection,
    config: &PipelineConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<SyncSummary, IngestError> {
    let start = Instant::now();
    let progress = progress.unwrap_or_else(epi_risk_source::progress::null_progress);
    progress.set_total(3);

    let fetched = fetch_aggregates(config, Some(progress.clone())).await?;

    progress.set_message(format!("Storing {} regions", fetched.aggregates.len()));
    let summary = store_aggregates(conn, &fetched)?;
    progress.inc(1);

    progress.finish(format!(
        "Synced {} regions from {} records",
        summary.regions, summary.records
    ));
    log::info!(
        "Sync complete: {} regions in {:.1}s",
        summary.regions,
        start.elapsed().as_secs_f64()
    );

    Ok(summary)
}

/// Writes aggregates and the feed refresh time to the store.
///
/// # Errors
///
/// Returns [`IngestError::Db`] if any write fails.
pub fn store_aggregates(
    conn: &duckdb::Connection,
    fetched: &FeedAggregates,
) -> Result<SyncSummary, IngestError> {
    let rows: Vec<_> = fetched.aggregates.iter().cloned().collect();
    let regions = epi_risk_database::upsert_regions(conn, &rows, Utc::now())?;

    if let Some(refreshed) = fetched.last_refreshed {
        epi_risk_database::set_last_refreshed(conn, refreshed)?;
    }

    Ok(SyncSummary {
        records: fetched.records,
        regions,
        last_refreshed: fetched.last_refreshed,
    })
}

/// Reads the feed's refresh time straight from the feed.
///
/// # Errors
///
/// Returns [`IngestError`] if the feed cannot be fetched or parsed.
pub async fn fetch_last_refreshed(
    config: &PipelineConfig,
) -> Result<Option<DateTime<Utc>>, IngestError> {
    let client = config.feeds.client()?;
    let snapshot = epi_risk_source::fetch_case_feed(&client, &config.feeds).await?;
    Ok(snapshot.last_refreshed)
}

#[cfg(test)]
mod tests {
    use epi_risk_database::open_in_memory;

    use super::*;

    fn record(state: &str, status: &str, gender: &str) -> RawCaseRecord {
        RawCaseRecord {
            gender: gender.to_string(),
            state: state.to_string(),
            status: status.to_string(),
            ..RawCaseRecord::default()
        }
    }

    fn records() -> Vec<RawCaseRecord> {
        let mut rows = Vec::new();
        for _ in 0..100 {
            rows.push(record("Alpha", "Hospitalized", "M"));
        }
        for _ in 0..100 {
            rows.push(record("Beta", "Recovered", "F"));
        }
        for _ in 0..250 {
            rows.push(record("Gamma", "Hospitalized", ""));
        }
        rows.push(record("Atlantis", "Deceased", "M"));
        rows.push(record("", "Migrated", ""));
        rows
    }

    fn population() -> Vec<PopulationRow> {
        vec![
            PopulationRow::new("ALPHA", 600),
            PopulationRow::new("ALPHA", 400),
            PopulationRow::new("BETA", 100_000),
            PopulationRow::new("GAMMA", 1_000_000),
        ]
    }

    #[test]
    fn ranks_only_regions_with_population() {
        let config = PipelineConfig::embedded().unwrap();
        let ranked = rank_inputs(&records(), &population(), &config).unwrap();

        let regions: Vec<_> = ranked.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(ranked.len(), 3);
        assert!(regions.contains(&"Alpha"));
        assert!(!regions.contains(&"Atlantis"));
        assert!(!regions.contains(&"Unknown"));
        assert!(
            ranked
                .windows(2)
                .all(|w| w[0].spread_probability <= w[1].spread_probability)
        );
    }

    #[test]
    fn bad_status_aborts_run() {
        let config = PipelineConfig::embedded().unwrap();
        let mut rows = records();
        rows.push(record("Alpha", "Quarantined", "M"));

        let err = rank_inputs(&rows, &population(), &config).unwrap_err();
        assert!(matches!(err, IngestError::Aggregate(_)));
    }

    #[test]
    fn single_populated_region_is_insufficient() {
        let config = PipelineConfig::embedded().unwrap();
        let rows = vec![record("Alpha", "Hospitalized", "M")];

        let err = rank_inputs(&rows, &population(), &config).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Rank(RankError::InsufficientData { regions: 1 })
        ));
    }

    #[test]
    fn store_keeps_every_aggregate() {
        let conn = open_in_memory().unwrap();
        let rows = records();
        let fetched = FeedAggregates {
            records: rows.len(),
            aggregates: build_aggregates(&rows).unwrap(),
            last_refreshed: None,
        };

        let summary = store_aggregates(&conn, &fetched).unwrap();

        assert_eq!(summary.records, rows.len());
        assert_eq!(summary.regions, 5);
        let stored = epi_risk_database::all_regions(&conn).unwrap();
        assert!(stored.iter().any(|r| r.region() == "Atlantis"));
        assert!(stored.iter().any(|r| r.unlabelled && r.region() == "Unknown"));
        assert_eq!(
            stored.iter().map(|r| r.aggregate.total).sum::<u64>(),
            rows.len() as u64
        );
    }
}
