#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for regional case counts and risk ranking.

use epi_risk_ingest::PipelineConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = PipelineConfig::load(None).map_err(std::io::Error::other)?;
    let db_path = epi_risk_database::paths::regions_db_path();

    epi_risk_server::run_server(&db_path, config).await
}
