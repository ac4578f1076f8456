//! HTTP error mapping for the record routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::StoreError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing x-actor-id header")]
    Unauthorized,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Store(StoreError::Validation(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(err) => match err {
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::Conflict { .. } => StatusCode::CONFLICT,
                StoreError::Validation(_) => StatusCode::BAD_REQUEST,
                StoreError::Transient { .. } => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Backend(_) | StoreError::Decode { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Unauthorized => json!({ "error": "Unauthorized", "code": "UNAUTHORIZED" }),
            ApiError::MalformedPayload(message) => json!({
                "error": "Malformed payload",
                "code": "BAD_REQUEST",
                "details": message,
            }),
            ApiError::Store(StoreError::NotFound { .. }) => json!({
                "error": self.to_string(),
                "code": "NOT_FOUND",
            }),
            ApiError::Store(StoreError::Conflict {
                current_version,
                current,
                ..
            }) => json!({
                "error": "Concurrent update detected",
                "code": "CONFLICT",
                "currentVersion": current_version,
                "current": current,
            }),
            ApiError::Store(StoreError::Validation(err)) => json!({
                "error": "Validation Error",
                "code": "BAD_REQUEST",
                "details": err.issues,
            }),
            ApiError::Store(err @ StoreError::Transient { .. }) => json!({
                "error": err.to_string(),
                "code": "UNAVAILABLE",
                "outcomeUnknown": err.outcome_unknown(),
            }),
            ApiError::Store(err) => json!({
                "error": err.to_string(),
                "code": "INTERNAL_ERROR",
            }),
        };

        (status, Json(body)).into_response()
    }
}
