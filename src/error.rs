//! Error types for the Broccoli server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Errors raised while resolving annotations, text and anchors
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No annotation found for body id {0}")]
    NotFound(String),

    #[error("No '{ancestor_type}' annotation encloses lines {start}..={end} of {text_source}")]
    AncestorNotFound {
        ancestor_type: String,
        text_source: String,
        start: usize,
        end: usize,
    },

    #[error("Missing target: {0}")]
    MissingTarget(String),

    #[error("Malformed selector: {0}")]
    MalformedSelector(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Gave up paginating after {pages} pages")]
    PaginationExhausted { pages: usize },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),
}

impl ResolveError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::AncestorNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MissingTarget(_) | Self::MalformedSelector(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PaginationExhausted { .. } | Self::Upstream(_) | Self::Decode(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::AncestorNotFound { .. } => "not_found",
            Self::MissingTarget(_) => "missing_target",
            Self::MalformedSelector(_) => "malformed_selector",
            Self::Unauthorized(_) => "unauthorized",
            Self::PaginationExhausted { .. } => "pagination_exhausted",
            Self::Upstream(_) | Self::Decode(_) => "upstream_error",
        }
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        ResolveError::Decode(err.to_string())
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Resolve(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    tracing::error!("Upstream failure: {}", e);
                } else {
                    tracing::info!("Resolve failed: {}", e);
                }
                (status, e.error_type(), e.to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(format!("{:?}", self))
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_status_codes() {
        assert_eq!(
            ResolveError::NotFound("urn:x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ResolveError::MalformedSelector("no start".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ResolveError::Unauthorized("textrepo".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ResolveError::PaginationExhausted { pages: 10 }.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_app_error_into_response_keeps_status() {
        let response = AppError::from(ResolveError::MissingTarget("Text".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::BadRequest("Undefined include".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
