//! Spatial response models.
//!
//! Shapes returned by the `/api/spatial` endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// A view in the scanned schema that carries a spatial column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TableDescriptor {
    pub schemaname: String,
    pub tablename: String,
    pub geometry_column: String,
    /// Either `geometry` or `geography`.
    pub geometry_type: String,
}

/// Spatial column types recognised by table discovery.
pub const SPATIAL_TYPES: [&str; 2] = ["geometry", "geography"];

impl TableDescriptor {
    pub fn is_spatial(&self) -> bool {
        SPATIAL_TYPES.contains(&self.geometry_type.as_str())
    }
}

/// Body of `GET /api/spatial/tables`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TablesResponse {
    pub tables: Vec<TableDescriptor>,
}

/// Extent of a geometry column in its own coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoundingBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BoundingBox {
    /// Whole-world lon/lat extent, used when a table has no extent.
    pub const WORLD: BoundingBox = BoundingBox {
        minx: -180.0,
        miny: -90.0,
        maxx: 180.0,
        maxy: 90.0,
    };
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::WORLD
    }
}

/// GeoJSON FeatureCollection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    /// Always present; empty when nothing matched.
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// GeoJSON Feature as produced by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    /// GeoJSON geometry, `null` when the source row has no geometry.
    #[schema(value_type = Object)]
    pub geometry: Value,
    /// Every non-geometry column of the source row.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub properties: Map<String, Value>,
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::empty()
    }
}

/// Body of the wildfire count endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub count: i64,
}
