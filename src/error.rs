use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid hazard: {0}")]
    InvalidHazard(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("no hazard-free route available")]
    NoSafeRoute,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable label used in metrics and simulation statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::InvalidHazard(_) => "invalid_hazard",
            AppError::Permission(_) => "permission",
            AppError::NotFound(_) => "not_found",
            AppError::UpstreamUnavailable(_) => "upstream_unavailable",
            AppError::NoSafeRoute => "no_safe_route",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NoRoute(msg) => AppError::NotFound(msg),
            ProviderError::InvalidRequest(msg) => AppError::InvalidRequest(msg),
            other => AppError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidRequest(_) | AppError::InvalidHazard(_) => StatusCode::BAD_REQUEST,
            AppError::Permission(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NoSafeRoute => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
