//! # API Errors
//!
//! HTTP-facing error taxonomy: validation failures are 400, credential
//! failures 401, store failures 500. Subscriber delivery failures and the
//! post-commit notify publish never reach this type; they are absorbed at
//! their call sites.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::liveness::LivenessError;
use crate::store::StoreError;

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Errors surfaced to API clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad or empty input
    #[error("{0}")]
    Validation(String),

    /// Bad or missing pre-shared credential
    #[error("Invalid or missing API key.")]
    Unauthorized,

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LivenessError> for ApiError {
    fn from(err: LivenessError) -> Self {
        match err {
            LivenessError::MissingNodeId => ApiError::Validation("Missing node_id".to_string()),
            LivenessError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("Empty payload.".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_liveness_error_maps_to_validation() {
        let err: ApiError = LivenessError::MissingNodeId.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Missing node_id");
    }
}
