#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for regional case counts and risk ranking.
//!
//! Stored counts are served from the `DuckDB` regions store. Reading the
//! region list also kicks off a background refresh from the case feed; the
//! risk ranking is computed on demand from freshly fetched inputs.

mod handlers;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use actix_web::{App, HttpServer, middleware, web};
use epi_risk_ingest::PipelineConfig;

/// Shared application state.
pub struct AppState {
    /// Regions store. `duckdb::Connection` is `Send` but not `Sync`, so a
    /// `Mutex` is needed.
    pub db: Arc<Mutex<duckdb::Connection>>,
    /// Pipeline configuration.
    pub config: Arc<PipelineConfig>,
    /// Whether `GET /` spawns a feed refresh.
    pub auto_refresh: bool,
    refreshing: AtomicBool,
}

impl AppState {
    /// Creates state around an open regions store.
    #[must_use]
    pub fn new(db: duckdb::Connection, config: PipelineConfig, auto_refresh: bool) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config: Arc::new(config),
            auto_refresh,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Locks the regions store.
    ///
    /// # Errors
    ///
    /// Returns a message if a previous holder panicked.
    pub fn conn(&self) -> Result<MutexGuard<'_, duckdb::Connection>, String> {
        self.db
            .lock()
            .map_err(|_| "regions store lock poisoned".to_string())
    }

    /// Marks a refresh as running. Returns `None` if one already is.
    ///
    /// The refresh counts as running until the returned guard is dropped,
    /// including when the task holding it panics.
    fn begin_refresh(self: &Arc<Self>) -> Option<RefreshGuard> {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(RefreshGuard {
            state: Arc::clone(self),
        })
    }
}

/// Clears [`AppState`]'s refresh flag on drop.
struct RefreshGuard {
    state: Arc<AppState>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.state.refreshing.store(false, Ordering::Release);
    }
}

/// Registers every route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/last_updated", web::get().to(handlers::last_updated))
        .route("/state/{name}", web::get().to(handlers::state))
        .route("/ML/spread_prob", web::get().to(handlers::spread_prob));
}

/// Starts the API server.
///
/// Opens the regions store at `db_path`, then serves on `BIND_ADDR`:`PORT`
/// (default `127.0.0.1:8080`). The caller provides the async runtime.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the store cannot be opened or the
/// HTTP server fails to bind.
#[allow(clippy::future_not_send)]
pub async fn run_server(db_path: &Path, config: PipelineConfig) -> std::io::Result<()> {
    log::info!("Opening regions store at {}", db_path.display());
    let conn = epi_risk_database::open(db_path).map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState::new(conn, config, true));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use chrono::{TimeZone as _, Utc};
    use epi_risk_case_models::{CaseStatus, Gender, RegionalAggregate};

    use super::*;

    fn seeded_state() -> web::Data<AppState> {
        let conn = epi_risk_database::open_in_memory().unwrap();
        let mut kerala = RegionalAggregate::new("Kerala");
        kerala.add(CaseStatus::Active, Gender::Female);
        kerala.add(CaseStatus::Recovered, Gender::Male);
        let mut goa = RegionalAggregate::new("Goa");
        goa.add(CaseStatus::Deceased, Gender::Unknown);

        let at = Utc.with_ymd_and_hms(2020, 5, 1, 10, 15, 30).unwrap();
        epi_risk_database::upsert_regions(&conn, &[kerala, goa], at).unwrap();
        epi_risk_database::set_last_refreshed(&conn, at).unwrap();

        let config = PipelineConfig::embedded().unwrap();
        web::Data::new(AppState::new(conn, config, false))
    }

    #[actix_web::test]
    async fn refresh_flag_allows_one_refresh_at_a_time() {
        let state = Arc::new(AppState::new(
            epi_risk_database::open_in_memory().unwrap(),
            PipelineConfig::embedded().unwrap(),
            false,
        ));

        let guard = state.begin_refresh().unwrap();
        assert!(state.begin_refresh().is_none());
        drop(guard);

        assert!(state.begin_refresh().is_some());
    }

    #[actix_web::test]
    async fn refresh_flag_clears_when_refresh_panics() {
        let state = Arc::new(AppState::new(
            epi_risk_database::open_in_memory().unwrap(),
            PipelineConfig::embedded().unwrap(),
            false,
        ));

        let guard = state.begin_refresh().unwrap();
        let refresh = std::thread::spawn(move || {
            let _guard = guard;
            panic!("refresh failed");
        });
        assert!(refresh.join().is_err());

        assert!(state.begin_refresh().is_some());
    }

    #[actix_web::test]
    async fn index_lists_stored_regions() {
        let app =
            test::init_service(App::new().app_data(seeded_state()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let result = body["result"].as_array().unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["region"], "Goa");
        assert_eq!(result[1]["total"], 2);
        assert!(result[1].get("id").is_none());
    }

    #[actix_web::test]
    async fn last_updated_reports_stored_refresh_time() {
        let app =
            test::init_service(App::new().app_data(seeded_state()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/last_updated").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["date"], "2020-05-01 10:15:30");
    }

    #[actix_web::test]
    async fn state_lookup_matches_partial_name() {
        let app =
            test::init_service(App::new().app_data(seeded_state()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/state/ker").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"]["region"], "Kerala");

        let req = test::TestRequest::get().uri("/state/assam").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
