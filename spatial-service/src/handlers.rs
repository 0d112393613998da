//! Handler module

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use common::errors::AppError;
use common::models::spatial::{BoundingBox, CountResponse, FeatureCollection, TablesResponse};
use common::response::ErrorBody;

use crate::connection_manager::ConnectionStatus;
use crate::queries;
use crate::service::GeoJsonRequest;
use crate::state::AppState;

fn default_geometry_column() -> String {
    queries::DEFAULT_GEOMETRY_COLUMN.to_string()
}

fn default_province_column() -> String {
    queries::DEFAULT_PROVINCE_COLUMN.to_string()
}

fn default_limit() -> u64 {
    queries::DEFAULT_LIMIT
}

/// Query parameters of the GeoJSON endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GeoJsonParams {
    /// Geometry column (default `geom`).
    #[serde(default = "default_geometry_column")]
    pub geometry_column: String,
    /// Keep rows whose province column equals this value; empty disables the filter.
    #[serde(default)]
    pub province_filter: String,
    /// Column compared with `province_filter` (default `province`).
    #[serde(default = "default_province_column")]
    pub province_column: String,
    /// Maximum number of rows (default 1000).
    #[serde(default = "default_limit")]
    pub limit: u64,
}

/// Query parameters of the bounds endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BoundsParams {
    /// Geometry column (default `geom`).
    #[serde(default = "default_geometry_column")]
    pub geometry_column: String,
}

/// Query parameters of the wildfire count endpoints.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProvinceParams {
    /// `Province` property to match; empty counts everything.
    #[serde(default)]
    pub province_filter: String,
}

/// List views with geometry columns
#[utoipa::path(
    get,
    path = "/api/spatial/tables",
    tag = "spatial",
    responses(
        (status = 200, description = "Spatial views", body = TablesResponse),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn list_tables(State(state): State<AppState>) -> Result<Json<TablesResponse>, AppError> {
    let tables = state.spatial_service().tables().await?;
    Ok(Json(TablesResponse { tables }))
}

/// Rows of a table as a GeoJSON FeatureCollection
#[utoipa::path(
    get,
    path = "/api/spatial/geojson/{table}",
    tag = "spatial",
    params(
        ("table" = String, Path, description = "Table or view name"),
        GeoJsonParams
    ),
    responses(
        (status = 200, description = "FeatureCollection", body = FeatureCollection),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn get_geojson(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<GeoJsonParams>,
) -> Result<Json<FeatureCollection>, AppError> {
    let request = GeoJsonRequest {
        geometry_column: params.geometry_column,
        province_filter: params.province_filter,
        province_column: params.province_column,
        limit: params.limit,
        ..GeoJsonRequest::new(table)
    };
    let collection = state.spatial_service().geojson(request).await?;
    Ok(Json(collection))
}

/// Bounding box of a table's geometry column
#[utoipa::path(
    get,
    path = "/api/spatial/bounds/{table}",
    tag = "spatial",
    params(
        ("table" = String, Path, description = "Table or view name"),
        BoundsParams
    ),
    responses(
        (status = 200, description = "Bounding box", body = BoundingBox),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn get_bounds(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<BoundsParams>,
) -> Result<Json<BoundingBox>, AppError> {
    let bounds = state
        .spatial_service()
        .bounds(&table, &params.geometry_column)
        .await?;
    Ok(Json(bounds))
}

/// Number of wildfires
#[utoipa::path(
    get,
    path = "/api/spatial/wildfires/count",
    tag = "spatial",
    params(ProvinceParams),
    responses(
        (status = 200, description = "Wildfire count", body = CountResponse),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn wildfires_count(
    State(state): State<AppState>,
    Query(params): Query<ProvinceParams>,
) -> Result<Json<CountResponse>, AppError> {
    let count = state
        .spatial_service()
        .wildfires_count(&params.province_filter)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// Number of wildfires near a track
#[utoipa::path(
    get,
    path = "/api/spatial/wildfires/active/count",
    tag = "spatial",
    params(ProvinceParams),
    responses(
        (status = 200, description = "Active wildfire count", body = CountResponse),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn active_wildfires_count(
    State(state): State<AppState>,
    Query(params): Query<ProvinceParams>,
) -> Result<Json<CountResponse>, AppError> {
    let count = state
        .spatial_service()
        .active_wildfires_count(&params.province_filter)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        connection: state.executor.connection_status(),
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub connection: ConnectionStatus,
}
