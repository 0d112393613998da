//! Spatial data service.
//!
//! Turns endpoint inputs into SQL, runs it and shapes the rows.

use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::spatial::{BoundingBox, FeatureCollection, TableDescriptor};
use common::utils::SqlText;
use serde_json::Value;

use crate::executor::{QueryExecutor, Row};
use crate::queries::{self, GeoJsonQuery};

/// Owned inputs of a GeoJSON request.
#[derive(Debug, Clone)]
pub struct GeoJsonRequest {
    pub table: String,
    pub geometry_column: String,
    pub where_clause: String,
    pub province_filter: String,
    pub province_column: String,
    pub limit: u64,
}

impl GeoJsonRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            geometry_column: queries::DEFAULT_GEOMETRY_COLUMN.to_string(),
            where_clause: String::new(),
            province_filter: String::new(),
            province_column: queries::DEFAULT_PROVINCE_COLUMN.to_string(),
            limit: queries::DEFAULT_LIMIT,
        }
    }

    fn as_query(&self) -> GeoJsonQuery<'_> {
        GeoJsonQuery {
            table: &self.table,
            geometry_column: &self.geometry_column,
            where_clause: &self.where_clause,
            province_filter: &self.province_filter,
            province_column: &self.province_column,
            limit: self.limit,
        }
    }
}

/// Spatial queries over a shared executor.
pub struct SpatialService {
    executor: Arc<dyn QueryExecutor>,
    schema: String,
    strict_identifiers: bool,
}

impl SpatialService {
    pub fn new(executor: Arc<dyn QueryExecutor>, schema: impl Into<String>, strict_identifiers: bool) -> Self {
        Self {
            executor,
            schema: schema.into(),
            strict_identifiers,
        }
    }

    /// Views carrying a geometry or geography column.
    pub async fn tables(&self) -> AppResult<Vec<TableDescriptor>> {
        let rows = self
            .executor
            .execute(&queries::list_geometry_tables(&self.schema))
            .await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let descriptor: TableDescriptor = serde_json::from_value(Value::Object(row))?;
            if descriptor.is_spatial() {
                tables.push(descriptor);
            }
        }
        Ok(tables)
    }

    /// Rows of a table as a GeoJSON FeatureCollection.
    pub async fn geojson(&self, mut request: GeoJsonRequest) -> AppResult<FeatureCollection> {
        if self.strict_identifiers {
            self.resolve_table(&request.table, &request.geometry_column).await?;
            if !SqlText::is_plain_identifier(&request.province_column) {
                return Err(AppError::Validation(format!(
                    "invalid province column '{}'",
                    request.province_column
                )));
            }
            request.province_filter = SqlText::escape_literal(&request.province_filter);
        }

        let sql = queries::spatial_data_as_geojson(&request.as_query());
        let rows = self.executor.execute(&sql).await.map_err(|e| {
            tracing::debug!(table = %request.table, error = %e, "Failed to get spatial data as GeoJSON");
            e
        })?;

        match first_value(rows, "geojson") {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(FeatureCollection::empty()),
        }
    }

    /// Extent of a table's geometry column, or the world box when it has none.
    pub async fn bounds(&self, table: &str, geometry_column: &str) -> AppResult<BoundingBox> {
        if self.strict_identifiers {
            self.resolve_table(table, geometry_column).await?;
        }

        let rows = self
            .executor
            .execute(&queries::bounds(table, geometry_column))
            .await?;

        let Some(row) = rows.first() else {
            return Ok(BoundingBox::WORLD);
        };
        let corners = (number(row, "minx"), number(row, "miny"), number(row, "maxx"), number(row, "maxy"));
        match corners {
            (Some(minx), Some(miny), Some(maxx), Some(maxy)) => Ok(BoundingBox { minx, miny, maxx, maxy }),
            _ => Ok(BoundingBox::WORLD),
        }
    }

    /// Number of wildfires, optionally in one province.
    pub async fn wildfires_count(&self, province_filter: &str) -> AppResult<i64> {
        self.count(&queries::wildfires_count(&self.filter_literal(province_filter)))
            .await
    }

    /// Number of wildfires near a track, optionally in one province.
    pub async fn active_wildfires_count(&self, province_filter: &str) -> AppResult<i64> {
        self.count(&queries::active_wildfires_count(&self.filter_literal(province_filter)))
            .await
    }

    async fn count(&self, sql: &str) -> AppResult<i64> {
        let rows = self.executor.execute(sql).await?;
        Ok(rows.first().and_then(|row| row.get("count")).and_then(Value::as_i64).unwrap_or(0))
    }

    fn filter_literal(&self, value: &str) -> String {
        if self.strict_identifiers {
            SqlText::escape_literal(value)
        } else {
            value.to_string()
        }
    }

    /// Strict mode: `table` and `geometry_column` must come from discovery.
    ///
    /// `table` may be given bare or schema-qualified.
    async fn resolve_table(&self, table: &str, geometry_column: &str) -> AppResult<()> {
        let known = self.tables().await?.into_iter().any(|t| {
            let qualified = format!("{}.{}", t.schemaname, t.tablename);
            (t.tablename == table || qualified == table) && t.geometry_column == geometry_column
        });
        if known {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "unknown spatial table '{table}' with geometry column '{geometry_column}'"
            )))
        }
    }
}

fn first_value(rows: Vec<Row>, column: &str) -> Option<Value> {
    rows.into_iter()
        .next()
        .and_then(|mut row| row.remove(column))
        .filter(|value| !value.is_null())
}

fn number(row: &Row, column: &str) -> Option<f64> {
    row.get(column).and_then(Value::as_f64)
}
