//! PostgreSQL sessions backed by `sqlx`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use serde_json::{Number, Value};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Executor, Row as _, TypeInfo};

use crate::connection_manager::{Provisioner, SpatialSession};
use crate::executor::Row;

/// Applied to every new session: the lowest level PostgreSQL offers.
const SET_LOWEST_ISOLATION: &str =
    "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL READ UNCOMMITTED";

/// A single PostgreSQL connection.
///
/// Each fetch runs inside its own transaction, closed by `commit` or by a
/// rollback on failure. Transport errors mark the session closed.
pub struct PgSession {
    conn: PgConnection,
    closed: bool,
}

impl PgSession {
    /// Opens a connection and sets its isolation level.
    pub async fn connect(options: &PgConnectOptions, timeout: Duration) -> AppResult<Self> {
        let connect = async {
            let mut conn = PgConnection::connect_with(options).await?;
            conn.execute(SET_LOWEST_ISOLATION).await?;
            Ok::<_, sqlx::Error>(conn)
        };

        let conn = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| {
                AppError::DatabaseConnection(format!("connect timed out after {}s", timeout.as_secs()))
            })?
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;

        Ok(Self { conn, closed: false })
    }

    async fn simple(&mut self, statement: &str) -> Result<(), sqlx::Error> {
        self.conn.execute(statement).await.map(|_| ())
    }

    /// Maps a driver error, closing the session when the link is unusable.
    async fn fail(&mut self, error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::Database(db) => {
                if self.simple("ROLLBACK").await.is_err() {
                    self.closed = true;
                }
                AppError::DatabaseQuery(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
                if self.simple("ROLLBACK").await.is_err() {
                    self.closed = true;
                }
                AppError::Serialization(error.to_string())
            }
            other => {
                self.closed = true;
                AppError::DatabaseConnection(other.to_string())
            }
        }
    }
}

#[async_trait]
impl SpatialSession for PgSession {
    fn is_closed(&self) -> bool {
        self.closed
    }

    fn mark_closed(&mut self) {
        self.closed = true;
    }

    async fn fetch_all(&mut self, sql: &str) -> AppResult<Vec<Row>> {
        if let Err(e) = self.simple("BEGIN").await {
            return Err(self.fail(e).await);
        }

        match self.conn.fetch_all(sql).await {
            Ok(rows) => match rows.iter().map(row_to_json).collect::<AppResult<Vec<_>>>() {
                Ok(rows) => Ok(rows),
                Err(e) => {
                    if self.simple("ROLLBACK").await.is_err() {
                        self.closed = true;
                    }
                    Err(e)
                }
            },
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn commit(&mut self) -> AppResult<()> {
        match self.simple("COMMIT").await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }
}

/// Converts a row into a JSON object keyed by column name.
///
/// Rows arrive in text format (simple query protocol), so types without a
/// dedicated mapping are returned as their textual representation.
pub fn row_to_json(row: &PgRow) -> AppResult<Row> {
    let mut out = Row::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = column_value(row, index, column.type_info().name())
            .map_err(|e| AppError::Serialization(format!("column '{}': {}", column.name(), e)))?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn column_value(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .and_then(|v| Number::from_f64(f64::from(v)))
            .map(Value::Number),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)?
            .and_then(Number::from_f64)
            .map(Value::Number),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
        _ => row.try_get_unchecked::<Option<String>, _>(index)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Connects with a fixed set of options.
pub struct StaticProvisioner {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl StaticProvisioner {
    pub fn from_url(url: &str, connect_timeout: Duration) -> AppResult<Self> {
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| AppError::Config(format!("invalid DATABASE_URL: {e}")))?;
        Ok(Self {
            options,
            connect_timeout,
        })
    }
}

#[async_trait]
impl Provisioner for StaticProvisioner {
    type Session = PgSession;

    async fn provision(&self) -> AppResult<PgSession> {
        PgSession::connect(&self.options, self.connect_timeout).await
    }
}
