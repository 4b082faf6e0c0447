#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the regional case pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use epi_risk_cli_utils::IndicatifProgress;
use epi_risk_ingest::{
    PipelineConfig, TIMESTAMP_FORMAT, compute_risk, fetch_last_refreshed, sync_regions,
};

#[derive(Parser)]
#[command(name = "epi_risk_ingest", about = "Regional case aggregation and risk ranking")]
struct Cli {
    /// Pipeline TOML to use instead of the embedded one
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// `DuckDB` file for stored regions (overrides `EPI_RISK_DB_PATH`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the case feed and upsert per-region counts into the store
    Sync,
    /// Fetch the case feed and population table and print the risk ranking
    Rank,
    /// Print when the case feed was last refreshed
    LastUpdated,
    /// Print every stored region
    Regions,
    /// Print the stored region whose name contains NAME (case-insensitive)
    Region {
        /// Full or partial region name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = epi_risk_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref())?;
    let db_path = cli
        .db
        .unwrap_or_else(epi_risk_database::paths::regions_db_path);

    match cli.command {
        Commands::Sync => {
            let conn = epi_risk_database::open(&db_path)?;
            let progress = IndicatifProgress::steps_bar(&multi, "Syncing regions", 3);
            let summary = sync_regions(&conn, &config, Some(progress)).await?;
            println!(
                "{}",
                serde_json::json!({
                    "records": summary.records,
                    "regions": summary.regions,
                    "lastRefreshed": summary.last_refreshed,
                })
            );
        }
        Commands::Rank => {
            let assignments = compute_risk(&config).await?;
            println!("{}", serde_json::to_string_pretty(&assignments)?);
        }
        Commands::LastUpdated => {
            let conn = epi_risk_database::open(&db_path)?;
            let stored = epi_risk_database::last_refreshed(&conn)?;
            let refreshed = match stored {
                Some(stored) => Some(stored),
                None => fetch_last_refreshed(&config).await?,
            };
            let date = refreshed.map(|dt| dt.format(TIMESTAMP_FORMAT).to_string());
            println!("{}", serde_json::json!({ "date": date }));
        }
        Commands::Regions => {
            let conn = epi_risk_database::open(&db_path)?;
            let regions = epi_risk_database::all_regions(&conn)?;
            println!("{}", serde_json::to_string_pretty(&regions)?);
        }
        Commands::Region { name } => {
            let conn = epi_risk_database::open(&db_path)?;
            let region = epi_risk_database::find_region(&conn, &name)?
                .ok_or_else(|| format!("No stored region matches {name:?}"))?;
            println!("{}", serde_json::to_string_pretty(&region)?);
        }
    }

    Ok(())
}
