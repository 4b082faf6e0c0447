#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk assignment output and ranking configuration types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of flat clusters the dendrogram is cut into by default.
pub const DEFAULT_CLUSTER_COUNT: usize = 6;

/// How flat cluster labels become alert levels.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertOrdering {
    /// Alert level is the cluster label as produced by the dendrogram
    /// traversal. Labels carry no severity order: level 1 is simply the
    /// cluster visited first.
    #[default]
    ClusterLabel,
    /// Clusters are relabelled 1..=k by ascending mean infected fraction, so
    /// level 1 is the least-infected tier.
    InfectedFraction,
}

/// Settings for the cluster ranker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RankingConfig {
    /// Maximum number of flat clusters (alert levels).
    #[serde(default = "default_clusters")]
    pub clusters: usize,
    /// Label-to-alert-level policy.
    #[serde(default)]
    pub alert_ordering: AlertOrdering,
}

const fn default_clusters() -> usize {
    DEFAULT_CLUSTER_COUNT
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            clusters: DEFAULT_CLUSTER_COUNT,
            alert_ordering: AlertOrdering::default(),
        }
    }
}

/// A region's place in the risk ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssignment {
    /// Normalized region name.
    pub region: String,
    /// Alert level, 1..=k.
    pub alert_level: u32,
    /// Cases divided by population.
    pub infected_fraction: f64,
    /// Display score in `[0, 100]` derived from the alert level, rounded to
    /// two decimals.
    pub spread_probability: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_config_defaults() {
        let config: RankingConfig = toml::from_str("").unwrap();
        assert_eq!(config.clusters, DEFAULT_CLUSTER_COUNT);
        assert_eq!(config.alert_ordering, AlertOrdering::ClusterLabel);
    }

    #[test]
    fn alert_ordering_reads_snake_case() {
        let config: RankingConfig =
            toml::from_str("clusters = 4\nalert_ordering = \"infected_fraction\"").unwrap();
        assert_eq!(config.clusters, 4);
        assert_eq!(config.alert_ordering, AlertOrdering::InfectedFraction);
        assert_eq!(
            "cluster_label".parse::<AlertOrdering>(),
            Ok(AlertOrdering::ClusterLabel)
        );
    }

    #[test]
    fn assignment_serializes_camel_case() {
        let json = serde_json::to_value(RiskAssignment {
            region: "Goa".to_string(),
            alert_level: 2,
            infected_fraction: 0.5,
            spread_probability: 71.43,
        })
        .unwrap();
        assert_eq!(json["alertLevel"], 2);
        assert_eq!(json["spreadProbability"], 71.43);
        assert_eq!(json.as_object().unwrap().len(), 4);
    }
}
