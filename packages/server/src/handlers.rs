//! HTTP handler functions.

use actix_web::{HttpResponse, web};
use epi_risk_ingest::{TIMESTAMP_FORMAT, compute_risk, fetch_aggregates, store_aggregates};
use epi_risk_server_models::{ApiError, ApiLastUpdated, ApiResult};

use crate::AppState;

fn server_error(context: &str, e: impl std::fmt::Display) -> HttpResponse {
    log::error!("{context}: {e}");
    HttpResponse::InternalServerError().json(ApiError::new(format!("{context}: {e}")))
}

/// `GET /`
///
/// Returns every stored region and starts a background refresh from the
/// case feed. The response reflects the store before that refresh.
pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    let regions = match state
        .conn()
        .and_then(|conn| epi_risk_database::all_regions(&conn).map_err(|e| e.to_string()))
    {
        Ok(regions) => regions,
        Err(e) => return server_error("Failed to read regions", e),
    };

    if state.auto_refresh {
        spawn_refresh(state.into_inner());
    }

    HttpResponse::Ok().json(ApiResult::new(regions))
}

/// Runs one sync in the background unless another is already running.
fn spawn_refresh(state: std::sync::Arc<AppState>) {
    let Some(guard) = state.begin_refresh() else {
        log::debug!("Refresh already running; not starting another");
        return;
    };

    actix_web::rt::spawn(async move {
        let _guard = guard;

        let result = match fetch_aggregates(&state.config, None).await {
            Ok(fetched) => state
                .conn()
                .and_then(|conn| store_aggregates(&conn, &fetched).map_err(|e| e.to_string())),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(summary) => log::info!(
                "Background refresh stored {} regions from {} records",
                summary.regions,
                summary.records
            ),
            Err(e) => log::error!("Background refresh failed: {e}"),
        }
    });
}

/// `GET /last_updated`
///
/// The feed's refresh time from the last sync, or read from the feed if no
/// sync has stored one yet.
pub async fn last_updated(state: web::Data<AppState>) -> HttpResponse {
    let stored = match state
        .conn()
        .and_then(|conn| epi_risk_database::last_refreshed(&conn).map_err(|e| e.to_string()))
    {
        Ok(stored) => stored,
        Err(e) => return server_error("Failed to read refresh time", e),
    };

    let refreshed = match stored {
        Some(stored) => Some(stored),
        None => match epi_risk_ingest::fetch_last_refreshed(&state.config).await {
            Ok(fetched) => fetched,
            Err(e) => return server_error("Failed to read case feed", e),
        },
    };

    HttpResponse::Ok().json(ApiLastUpdated {
        date: refreshed.map(|dt| dt.format(TIMESTAMP_FORMAT).to_string()),
    })
}

/// `GET /state/{name}`
///
/// The stored region whose name contains `name`, ignoring case.
pub async fn state(state: web::Data<AppState>, name: web::Path<String>) -> HttpResponse {
    let name = name.into_inner();

    match state
        .conn()
        .and_then(|conn| epi_risk_database::find_region(&conn, &name).map_err(|e| e.to_string()))
    {
        Ok(Some(region)) => HttpResponse::Ok().json(ApiResult::new(region)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiError::new(format!("No region matches {name:?}")))
        }
        Err(e) => server_error("Failed to look up region", e),
    }
}

/// `GET /ML/spread_prob`
///
/// Fetches fresh inputs and returns the risk ranking, sorted ascending by
/// spread probability.
pub async fn spread_prob(state: web::Data<AppState>) -> HttpResponse {
    match compute_risk(&state.config).await {
        Ok(assignments) => HttpResponse::Ok().json(ApiResult::new(assignments)),
        Err(e) => server_error("Failed to rank regions", e),
    }
}
