//! Alert levels and spread probabilities from flat clusters.

use std::collections::BTreeMap;

use epi_risk_population_models::PopulatedAggregate;
use epi_risk_risk_models::{AlertOrdering, RankingConfig, RiskAssignment};

use crate::RankError;
use crate::cut::maxclust;
use crate::features::{complete_rows, feature_matrix, whiten};
use crate::linkage::ward_linkage;

/// Display score for an alert level: `(1 - level / (clusters + 1)) * 100`,
/// rounded half away from zero to two decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn spread_probability(level: u32, clusters: usize) -> f64 {
    let raw = (1.0 - f64::from(level) / (clusters as f64 + 1.0)) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Ranks every region with a known population.
///
/// Rows missing a population are dropped first. The remaining rows are
/// whitened, clustered with Ward linkage, and cut into at most
/// `config.clusters` groups. The result is sorted ascending by spread
/// probability; equal scores keep input order.
///
/// # Errors
///
/// * [`RankError::InvalidClusterCount`] if `config.clusters` is zero
/// * [`RankError::InsufficientData`] if fewer than two rows are complete
/// * [`RankError::InvalidFeatureMatrix`] if a feature is not finite
pub fn rank_regions(
    rows: &[PopulatedAggregate],
    config: &RankingConfig,
) -> Result<Vec<RiskAssignment>, RankError> {
    if config.clusters == 0 {
        return Err(RankError::InvalidClusterCount {
            clusters: config.clusters,
        });
    }

    let complete = complete_rows(rows);
    if complete.len() < 2 {
        return Err(RankError::InsufficientData {
            regions: complete.len(),
        });
    }

    let features = whiten(&feature_matrix(&complete)?);
    let merges = ward_linkage(&features)?;
    let mut labels = maxclust(&merges, complete.len(), config.clusters);

    if config.alert_ordering == AlertOrdering::InfectedFraction {
        labels = order_by_fraction(&labels, &complete);
    }

    log::info!(
        "Ranked {} regions into {} alert levels ({} dropped for missing population)",
        complete.len(),
        labels.iter().max().copied().unwrap_or(0),
        rows.len() - complete.len()
    );

    let mut assignments: Vec<RiskAssignment> = complete
        .iter()
        .zip(&labels)
        .map(|(row, &level)| RiskAssignment {
            region: row.region().to_string(),
            alert_level: level,
            infected_fraction: row.infected_fraction.unwrap_or_default(),
            spread_probability: spread_probability(level, config.clusters),
        })
        .collect();

    assignments.sort_by(|a, b| a.spread_probability.total_cmp(&b.spread_probability));

    Ok(assignments)
}

/// Relabels clusters `1..=m` by ascending mean infected fraction. Clusters
/// with equal means keep their original relative order.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn order_by_fraction(labels: &[u32], rows: &[&PopulatedAggregate]) -> Vec<u32> {
    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (&label, row) in labels.iter().zip(rows) {
        let entry = sums.entry(label).or_default();
        entry.0 += row.infected_fraction.unwrap_or_default();
        entry.1 += 1;
    }

    let mut means: Vec<(u32, f64)> = sums
        .into_iter()
        .map(|(label, (sum, count))| (label, sum / count as f64))
        .collect();
    means.sort_by(|a, b| a.1.total_cmp(&b.1));

    let relabel: BTreeMap<u32, u32> = means
        .iter()
        .enumerate()
        .map(|(idx, &(label, _))| (label, idx as u32 + 1))
        .collect();

    labels.iter().map(|label| relabel[label]).collect()
}
