//! Spatial query service
//!
//! Serves PostGIS tables and views to a map frontend:
//! - discovery of views with geometry columns
//! - rows as GeoJSON FeatureCollections
//! - bounding boxes and wildfire counts
//! - the static frontend pages

mod connection_manager;
mod executor;
mod handlers;
mod lakebase;
mod postgres;
mod queries;
mod routes;
mod service;
mod state;
mod static_pages;
#[cfg(test)]
mod test_support;

use axum::{middleware, routing::get, Json, Router};
use common::config::{self, AppConfig};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "spatial-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Spatial Query API",
        version = "0.1.0",
        description = "PostGIS tables as GeoJSON"
    ),
    paths(
        handlers::list_tables,
        handlers::get_geojson,
        handlers::get_bounds,
        handlers::wildfires_count,
        handlers::active_wildfires_count,
        handlers::health_check,
    ),
    components(schemas(
        common::models::spatial::TableDescriptor,
        common::models::spatial::TablesResponse,
        common::models::spatial::FeatureCollection,
        common::models::spatial::Feature,
        common::models::spatial::BoundingBox,
        common::models::spatial::CountResponse,
        common::response::ErrorBody,
        connection_manager::ConnectionStatus,
        handlers::HealthResponse,
    )),
    tags(
        (name = "spatial", description = "Spatial data endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::load_with_service(SERVICE_NAME)?;
    let addr = config.bind_addr();
    let state = AppState::new(config)?;
    let app = create_router(state);

    info!(service = SERVICE_NAME, address = %addr, "Starting service");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(service = SERVICE_NAME, "Service stopped");
    Ok(())
}

pub(crate) fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .merge(static_pages::router(&state.config.frontend_dir))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_spatial_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/spatial/tables",
            "/api/spatial/geojson/{table}",
            "/api/spatial/bounds/{table}",
            "/api/spatial/wildfires/count",
            "/api/spatial/wildfires/active/count",
            "/api/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
