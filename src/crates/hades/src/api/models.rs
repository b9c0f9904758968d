//! Request and response bodies

use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::models::{RollbackOutcome, RollbackReport};

/// Largest `limit` / `count` accepted in one request
pub const MAX_PAGE: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRequest {
    pub command: String,
    pub operation_type: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResponse {
    pub operation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub operation_id: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub status: String,
}

/// Either one id, or how many recent operations to reverse (default 1)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackRequest {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RollbackResponse {
    Single(RollbackReport),
    Batch(Vec<RollbackReport>),
}

impl RollbackResponse {
    pub fn single(operation_id: impl Into<String>, outcome: RollbackOutcome) -> Self {
        Self::Single(RollbackReport {
            operation_id: operation_id.into(),
            outcome,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub database: String,
}

impl HealthResponse {
    pub fn new(status: &str, database: &str) -> Self {
        Self {
            status: status.to_string(),
            service: "hades-api".to_string(),
            database: database.to_string(),
        }
    }
}

/// Reject page sizes outside `1..=MAX_PAGE`
pub fn validate_page(name: &str, value: u32) -> Result<u32, ApiError> {
    if value == 0 || value > MAX_PAGE {
        return Err(ApiError::ValidationError(format!(
            "{} must be between 1 and {}",
            name, MAX_PAGE
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_request_defaults() {
        let req: RollbackRequest = serde_json::from_str("{}").unwrap();
        assert!(req.operation_id.is_none());
        assert!(req.count.is_none());
    }

    #[test]
    fn test_validate_page() {
        assert!(validate_page("limit", 10).is_ok());
        assert!(validate_page("limit", 0).is_err());
        assert!(validate_page("count", MAX_PAGE + 1).is_err());
    }
}
