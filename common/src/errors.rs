//! Application error type.
//!
//! Every failure surfaces to HTTP clients as `{"detail": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ErrorBody;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provisioning or liveness failure of the database connection.
    #[error("database connection failed: {0}")]
    DatabaseConnection(String),

    /// Malformed SQL or a backend rejection. The driver message is kept verbatim.
    #[error("{0}")]
    DatabaseQuery(String),

    /// A query ran past its deadline.
    #[error("query exceeded deadline of {0}s")]
    QueryTimeout(u64),

    /// The managed database API answered with an error.
    #[error("provisioning service error: {0}")]
    ExternalService(String),

    /// A result could not be turned into the expected shape.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Rejected request input (strict identifier mode only).
    #[error("{0}")]
    Validation(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "request rejected");
        }
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}
