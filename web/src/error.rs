//! Error types for web handlers.
//!
//! [`AppError`] bridges domain errors and HTTP responses. The JSON body is
//! always `{ "code": ..., "message": ... }`, where `code` is the stable
//! machine-readable code of the domain error.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use staysync_core::error::{BookingError, InventoryError};
use std::fmt;

/// Application error that converts to an HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new error with explicit status, message and code.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
            source: None,
        }
    }

    /// Attach an underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// 404 Not Found for `resource` with `id`.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND",
        )
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_SERVER_ERROR")
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                error = ?self.source,
                "Internal server error"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let status = match &err {
            BookingError::InvalidDateRange
            | BookingError::GuestLimitExceeded { .. }
            | BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::NotAvailable
            | BookingError::NowUnavailable
            | BookingError::InvalidTransition { .. }
            | BookingError::AlreadyCancelled => StatusCode::CONFLICT,
            BookingError::Forbidden => StatusCode::FORBIDDEN,
            BookingError::PropertyNotFound(_) | BookingError::BookingNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            BookingError::InventoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string(), err.code())
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        let status = match &err {
            InventoryError::PropertyNotFound(_) => StatusCode::NOT_FOUND,
            InventoryError::Conflict { .. } => StatusCode::CONFLICT,
            InventoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            InventoryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string(), err.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use staysync_core::types::{BookingId, BookingStatus};

    #[test]
    fn display_includes_code() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn booking_errors_map_to_statuses_and_codes() {
        let cases = [
            (BookingError::InvalidDateRange, StatusCode::BAD_REQUEST, "INVALID_DATES"),
            (BookingError::NotAvailable, StatusCode::CONFLICT, "NOT_AVAILABLE"),
            (BookingError::NowUnavailable, StatusCode::CONFLICT, "NOW_UNAVAILABLE"),
            (BookingError::Forbidden, StatusCode::FORBIDDEN, "FORBIDDEN"),
            (
                BookingError::InvalidTransition {
                    from: BookingStatus::Accepted,
                    to: BookingStatus::Accepted,
                },
                StatusCode::CONFLICT,
                "INVALID_STATUS",
            ),
            (
                BookingError::BookingNotFound(BookingId::new()),
                StatusCode::NOT_FOUND,
                "BOOKING_NOT_FOUND",
            ),
            (
                BookingError::InventoryUnavailable("timeout".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "INVENTORY_UNAVAILABLE",
            ),
        ];

        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status(), status);
            assert_eq!(app.code(), code);
        }
    }
}
