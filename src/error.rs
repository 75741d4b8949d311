//! Error types for the inventory server

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes exposed in error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    DuplicateIsbn,
    NoCopiesAvailable,
    Unauthenticated,
    RateLimited,
    CacheFailure,
    Failure,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input: blank identifier, missing record on add
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate ISBN: {0}")]
    DuplicateIsbn(String),

    #[error("No copies available: {0}")]
    NoCopiesAvailable(String),

    /// Raised by the access gate only
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    /// Raised by the access gate only
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::DuplicateIsbn(_) => ErrorCode::DuplicateIsbn,
            AppError::NoCopiesAvailable(_) => ErrorCode::NoCopiesAvailable,
            AppError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Cache(_) => ErrorCode::CacheFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::DuplicateIsbn(msg) => (StatusCode::CONFLICT, msg.clone()),
            // Kept as 400 for compatibility with existing clients
            AppError::NoCopiesAvailable(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, slow down.".to_string(),
            ),
            AppError::Cache(msg) => {
                tracing::error!("Cache error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Cache unavailable".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: format!("{:?}", self.code()),
            message,
        });

        let mut response = (status, body).into_response();
        if let AppError::RateLimited { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
