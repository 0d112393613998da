//! Routing module

use axum::{routing::get, Router};

use crate::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/spatial/tables", get(handlers::list_tables))
        .route("/api/spatial/geojson/{table}", get(handlers::get_geojson))
        .route("/api/spatial/bounds/{table}", get(handlers::get_bounds))
        .route("/api/spatial/wildfires/count", get(handlers::wildfires_count))
        .route(
            "/api/spatial/wildfires/active/count",
            get(handlers::active_wildfires_count),
        )
        .route("/api/health", get(handlers::health_check))
}
