//! SQL templates for the spatial endpoints.
//!
//! Table and column names are interpolated into the statement text because
//! identifiers cannot be bound as parameters. Callers are trusted; strict
//! identifier mode in the service layer narrows the inputs before they reach
//! these builders.

pub const DEFAULT_GEOMETRY_COLUMN: &str = "geom";
pub const DEFAULT_PROVINCE_COLUMN: &str = "province";
pub const DEFAULT_LIMIT: u64 = 1000;

/// Inputs of the GeoJSON FeatureCollection query.
#[derive(Debug, Clone)]
pub struct GeoJsonQuery<'a> {
    pub table: &'a str,
    pub geometry_column: &'a str,
    /// Free-form condition, used verbatim.
    pub where_clause: &'a str,
    pub province_filter: &'a str,
    pub province_column: &'a str,
    pub limit: u64,
}

impl<'a> GeoJsonQuery<'a> {
    pub fn new(table: &'a str) -> Self {
        Self {
            table,
            geometry_column: DEFAULT_GEOMETRY_COLUMN,
            where_clause: "",
            province_filter: "",
            province_column: DEFAULT_PROVINCE_COLUMN,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Views in `schema` with a `geometry` or `geography` column.
pub fn list_geometry_tables(schema: &str) -> String {
    format!(
        "SELECT
            t.schemaname::text AS schemaname,
            t.viewname::text AS tablename,
            a.attname::text AS geometry_column,
            ty.typname::text AS geometry_type
        FROM pg_views t
        JOIN pg_namespace n ON n.nspname = t.schemaname
        JOIN pg_class c ON c.relname = t.viewname AND c.relnamespace = n.oid
        JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum > 0 AND NOT a.attisdropped
        JOIN pg_type ty ON ty.oid = a.atttypid
        WHERE t.schemaname = '{schema}'
        AND ty.typname IN ('geometry', 'geography')
        ORDER BY tablename;"
    )
}

/// AND-joins the non-empty free-form clause and the province equality.
fn where_sql(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn geojson_conditions(query: &GeoJsonQuery<'_>) -> Vec<String> {
    let mut conditions = Vec::new();
    if !query.where_clause.is_empty() {
        conditions.push(query.where_clause.to_string());
    }
    if !query.province_filter.is_empty() {
        conditions.push(format!("{} = '{}'", query.province_column, query.province_filter));
    }
    conditions
}

/// Wraps the filtered, limited rows into one FeatureCollection, column `geojson`.
///
/// `jsonb_agg` yields NULL when no rows match; the caller maps that to an
/// empty collection.
pub fn spatial_data_as_geojson(query: &GeoJsonQuery<'_>) -> String {
    let geom = query.geometry_column;
    format!(
        "SELECT jsonb_build_object(
            'type', 'FeatureCollection',
            'features', jsonb_agg(
                jsonb_build_object(
                    'type', 'Feature',
                    'geometry', ST_AsGeoJSON({geom})::jsonb,
                    'properties', to_jsonb(t.*) - '{geom}'
                )
            )
        ) AS geojson
        FROM (
            SELECT * FROM {table}
            {where_sql}
            LIMIT {limit}
        ) t;",
        table = query.table,
        where_sql = where_sql(&geojson_conditions(query)),
        limit = query.limit,
    )
}

/// Extent of `geometry_column` over the whole table.
pub fn bounds(table: &str, geometry_column: &str) -> String {
    format!(
        "SELECT
            ST_XMin(ST_Extent({geometry_column})) AS minx,
            ST_YMin(ST_Extent({geometry_column})) AS miny,
            ST_XMax(ST_Extent({geometry_column})) AS maxx,
            ST_YMax(ST_Extent({geometry_column})) AS maxy
        FROM {table};"
    )
}

fn province_property_filter(alias: &str, province_filter: &str) -> String {
    if province_filter.is_empty() {
        String::new()
    } else {
        where_sql(&[format!("{alias}properties->>'Province' = '{province_filter}'")])
    }
}

/// Number of wildfires, optionally restricted to one province.
pub fn wildfires_count(province_filter: &str) -> String {
    format!(
        "SELECT COUNT(*) AS count
        FROM wildfires
        {};",
        province_property_filter("", province_filter)
    )
}

/// Number of wildfires near a track, optionally restricted to one province.
pub fn active_wildfires_count(province_filter: &str) -> String {
    format!(
        "SELECT COUNT(*) AS count
        FROM fire_near_track ft
        JOIN wildfires w ON w.id = ft.wid
        {};",
        province_property_filter("w.", province_filter)
    )
}
