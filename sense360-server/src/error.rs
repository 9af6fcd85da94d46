//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sense360_core::api::ErrorResponse;
use sense360_core::RegistryError;

/// API error types mapped to HTTP status codes.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Unavailable(String),
    BadRequest(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "Invalid device data: {}", e),
            Self::NotFound(e) => write!(f, "Not found: {}", e),
            Self::Unavailable(e) => write!(f, "Unavailable: {}", e),
            Self::BadRequest(e) => write!(f, "Bad request: {}", e),
            Self::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "Invalid device data".to_string(),
                Some(e),
            ),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "Device not found".to_string(), None),
            Self::Unavailable(e) => (StatusCode::SERVICE_UNAVAILABLE, e, None),
            Self::BadRequest(e) => (StatusCode::BAD_REQUEST, e, None),
            Self::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error,
            details,
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(msg) => Self::Validation(msg),
            RegistryError::NotFound(id) => Self::NotFound(id),
            RegistryError::TransientUnavailable(msg) => Self::Unavailable(msg),
            RegistryError::Transport(msg) => Self::Internal(msg),
        }
    }
}
