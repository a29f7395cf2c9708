//! Unified error handling
//!
//! Provides the application error type and the response envelope:
//! - [`AppError`] - application error enum
//! - [`ApiResponse`] - API response structure
//!
//! # Error code scheme
//!
//! | Prefix | Category | Example |
//! |--------|----------|---------|
//! | E0xxx  | Business | E0002 validation failed |
//! | E01xx  | Fulfillment | E0101 insufficient stock |
//! | E2xxx  | Authorization | E2001 permission denied |
//! | E9xxx  | System | E9002 database error |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Unified API response envelope
///
/// ```json
/// {
///   "code": "E0000",
///   "message": "success",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Error code (E0000 means success)
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Build a success response
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: "E0000".to_string(),
        message: "success".to_string(),
        data: Some(data),
    })
}

/// Application error enum
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Authorization errors (4xx) ==========
    #[error("Permission denied: {0}")]
    Forbidden(String),

    // ========== Business errors (4xx) ==========
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // ========== Fulfillment errors (4xx) ==========
    /// Requested quantity exceeds available stock. Expected and recoverable;
    /// the enclosing transaction is rolled back with no partial writes.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: uuid::Uuid,
        requested: i32,
        available: i32,
    },

    /// A state-machine edge that does not exist (order status, payment
    /// status, or commission workflow).
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    // ========== System errors (5xx) ==========
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Error code string for the response envelope
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Forbidden(_) => "E2001",
            AppError::NotFound(_) => "E0003",
            AppError::Conflict(_) => "E0004",
            AppError::Validation(_) => "E0002",
            AppError::InsufficientStock { .. } => "E0101",
            AppError::InvalidTransition(_) => "E0102",
            AppError::Database(_) => "E9002",
            AppError::Internal(_) => "E9001",
        }
    }
}

/// `?` propagation from sqlx without per-call-site `.map_err` boilerplate.
/// Infrastructure failures are logged here and surfaced as a generic
/// database error; business errors never take this path.
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        error!(target: "database", error = %e, "Database error occurred");
        AppError::Database(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InsufficientStock { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg.clone()),

            // 5xx: log details server-side, generic message to the caller
            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ApiResponse::<()> {
            code: code.to_string(),
            message,
            data: None,
        });

        (status, body).into_response()
    }
}

/// Convenience alias used by handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_maps_to_400() {
        let err = AppError::InsufficientStock {
            product_id: uuid::Uuid::nil(),
            requested: 3,
            available: 1,
        };
        assert_eq!(err.code(), "E0101");
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_transition_maps_to_409() {
        let err = AppError::invalid_transition("paid -> pending");
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn database_error_hides_details() {
        let err = AppError::database("connection refused to 10.0.0.1");
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
