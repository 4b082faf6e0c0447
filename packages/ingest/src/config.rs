//! Pipeline configuration.
//!
//! The default configuration is embedded at compile time via
//! [`include_str!`]. `EPI_RISK_CONFIG` (or an explicit path) replaces it
//! with a file read at startup.

use std::path::{Path, PathBuf};

use epi_risk_population_models::JoinConfig;
use epi_risk_risk_models::RankingConfig;
use epi_risk_source::FeedConfig;
use serde::{Deserialize, Serialize};

use crate::IngestError;

/// Environment variable naming a pipeline TOML to load instead of the
/// embedded one.
pub const CONFIG_ENV: &str = "EPI_RISK_CONFIG";

const EMBEDDED_CONFIG: &str = include_str!("../config/pipeline.toml");

/// Everything a pipeline run needs besides its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Upstream feed locations.
    pub feeds: FeedConfig,
    /// Rename and override tables for the population join.
    #[serde(default)]
    pub population: JoinConfig,
    /// Cluster ranking settings.
    #[serde(default)]
    pub ranking: RankingConfig,
}

impl PipelineConfig {
    /// Parses a pipeline configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if the text is not valid TOML for
    /// this shape or the ranking asks for zero clusters.
    pub fn from_toml(text: &str) -> Result<Self, IngestError> {
        let config: Self = toml::from_str(text).map_err(|e| IngestError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The configuration compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if the embedded file is invalid.
    pub fn embedded() -> Result<Self, IngestError> {
        Self::from_toml(EMBEDDED_CONFIG)
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Io`] if the file cannot be read and
    /// [`IngestError::Config`] if it is invalid.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        log::info!("Loading pipeline config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Loads `explicit` if given, else the file named by [`CONFIG_ENV`],
    /// else the embedded default.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the chosen file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self, IngestError> {
        let from_env = std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_path(&path),
            None => Self::embedded(),
        }
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.ranking.clusters == 0 {
            return Err(IngestError::Config {
                message: "ranking.clusters must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use epi_risk_risk_models::AlertOrdering;

    use super::*;

    #[test]
    fn embedded_config_parses() {
        let config = PipelineConfig::embedded().unwrap();

        assert!(config.feeds.case_feed_url.starts_with("https://"));
        assert_eq!(config.feeds.region_column, "State name");
        assert_eq!(
            config.population.renames.get("Pondicherry").map(String::as_str),
            Some("Puducherry")
        );
        assert_eq!(config.population.overrides.get("Delhi"), Some(&16_787_941));
        assert_eq!(config.population.overrides.len(), 4);
        assert_eq!(config.ranking.clusters, 6);
        assert_eq!(config.ranking.alert_ordering, AlertOrdering::ClusterLabel);
    }

    #[test]
    fn population_and_ranking_sections_are_optional() {
        let config = PipelineConfig::from_toml(
            r#"
            [feeds]
            case_feed_url = "http://localhost/cases.json"
            population_csv_url = "http://localhost/census.csv"
            "#,
        )
        .unwrap();

        assert!(config.population.overrides.is_empty());
        assert_eq!(config.ranking, RankingConfig::default());
    }

    #[test]
    fn zero_clusters_is_rejected() {
        let err = PipelineConfig::from_toml(
            r#"
            [feeds]
            case_feed_url = "http://localhost/cases.json"
            population_csv_url = "http://localhost/census.csv"

            [ranking]
            clusters = 0
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, IngestError::Config { .. }));
    }
}
