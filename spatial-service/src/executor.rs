//! Query execution over the managed connection.

use std::time::Duration;

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use tokio::time::{timeout_at, Instant};

use crate::connection_manager::{ConnectionManager, ConnectionStatus, Provisioner, SpatialSession};

/// One result row: column name to value, in result set order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Runs SQL text and returns the rows.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> AppResult<Vec<Row>>;

    fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus::default()
    }
}

/// Executes statements on the single shared connection.
///
/// Every successful fetch is followed by a commit so the connection is idle
/// for the next caller. The whole call, including the wait for the
/// connection, runs under `deadline`. A session that blows the deadline while
/// in use is discarded.
pub struct SqlExecutor<P: Provisioner> {
    manager: ConnectionManager<P>,
    deadline: Duration,
}

impl<P: Provisioner> SqlExecutor<P> {
    pub fn new(manager: ConnectionManager<P>, deadline: Duration) -> Self {
        Self { manager, deadline }
    }

    async fn run(&self, sql: &str) -> AppResult<Vec<Row>> {
        let deadline = Instant::now() + self.deadline;

        let mut conn = timeout_at(deadline, self.manager.get_connection())
            .await
            .map_err(|_| AppError::QueryTimeout(self.deadline.as_secs()))??;
        let generation = conn.generation();

        match timeout_at(deadline, fetch_and_commit(conn.session_mut(), sql)).await {
            Ok(result) => {
                if let Ok(rows) = &result {
                    tracing::debug!(generation, sql_len = sql.len(), rows = rows.len(), "Spatial query finished");
                }
                result
            }
            Err(_) => {
                conn.session_mut().mark_closed();
                Err(AppError::QueryTimeout(self.deadline.as_secs()))
            }
        }
    }
}

async fn fetch_and_commit<S: SpatialSession>(session: &mut S, sql: &str) -> AppResult<Vec<Row>> {
    let rows = session.fetch_all(sql).await?;
    session.commit().await?;
    Ok(rows)
}

#[async_trait]
impl<P: Provisioner> QueryExecutor for SqlExecutor<P> {
    async fn execute(&self, sql: &str) -> AppResult<Vec<Row>> {
        self.run(sql).await.map_err(|e| {
            tracing::error!(error = %e, "Spatial query failed");
            e
        })
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.manager.status()
    }
}
