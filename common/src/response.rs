//! HTTP error body.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body returned for every failed API request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Stringified error message.
    pub detail: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
