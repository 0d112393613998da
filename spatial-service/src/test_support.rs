//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use serde_json::{json, Value};

use crate::executor::{QueryExecutor, Row};

/// Collects formatted log lines at `info` and above.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

type Responder = dyn Fn(&str) -> AppResult<Vec<Row>> + Send + Sync;

/// Executor answering from a closure and recording every statement.
#[derive(Clone)]
pub struct FakeExecutor {
    responder: Arc<Responder>,
    statements: Arc<Mutex<Vec<String>>>,
}

impl FakeExecutor {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> AppResult<Vec<Row>> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            statements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(&self, sql: &str) -> AppResult<Vec<Row>> {
        self.statements.lock().unwrap().push(sql.to_string());
        (self.responder)(sql)
    }
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn token_after<'a>(sql: &'a str, marker: &str) -> Option<&'a str> {
    let start = sql.find(marker)? + marker.len();
    sql[start..].split_whitespace().next()
}

/// Answers like a database holding one spatial view, `airports`, with five
/// point rows. Any other table does not exist.
pub fn airport_rows(sql: &str) -> AppResult<Vec<Row>> {
    if sql.contains("FROM pg_views") {
        return Ok(vec![object(json!({
            "schemaname": "public",
            "tablename": "airports",
            "geometry_column": "geom",
            "geometry_type": "geometry"
        }))]);
    }

    let table = token_after(sql, "SELECT * FROM ")
        .or_else(|| token_after(sql, "FROM "))
        .unwrap_or_default()
        .trim_end_matches(';');
    if table != "airports" && table != "public.airports" {
        return Err(AppError::DatabaseQuery(format!("relation \"{table}\" does not exist")));
    }

    if sql.contains("ST_Extent") {
        return Ok(vec![object(json!({"minx": -79.6, "miny": 43.6, "maxx": -63.5, "maxy": 46.8}))]);
    }

    let limit: usize = token_after(sql, "LIMIT ")
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX);
    let airports = [
        ("YYZ", -79.63, 43.68),
        ("YUL", -73.74, 45.47),
        ("YOW", -75.67, 45.32),
        ("YHZ", -63.51, 44.88),
        ("YQB", -71.39, 46.79),
    ];
    let features: Vec<Value> = airports
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, (code, lon, lat))| {
            json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [lon, lat]},
                "properties": {"id": i + 1, "iata": code}
            })
        })
        .collect();

    let geojson = if features.is_empty() {
        Value::Null
    } else {
        json!({"type": "FeatureCollection", "features": features})
    };
    Ok(vec![object(json!({ "geojson": geojson }))])
}
