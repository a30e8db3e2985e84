//! Centralized error types for the MusicRoom core library.
//!
//! - Structured error types using `thiserror`
//! - Mapping to HTTP status codes
//! - `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::backend::{CatalogError, NotifierError};
use crate::rooms::signal::SignalError;
use crate::rooms::RoomKind;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for NotifierError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::InvalidUrl(_) => "invalid_backend_url",
        }
    }
}

impl ErrorCode for CatalogError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::InvalidUrl(_) => "invalid_catalog_url",
            Self::Misaligned { .. } => "catalog_misaligned",
        }
    }
}

impl ErrorCode for SignalError {
    fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed_signal",
            Self::Unroutable { .. } => "unroutable_signal",
        }
    }
}

/// Application-wide error type for room operations.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum RoomError {
    /// No live room with this ID.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// A room with this ID is live or being created.
    #[error("Room already exists: {room_id} ({} room)", .kind.as_str())]
    RoomAlreadyExists { room_id: String, kind: RoomKind },

    /// The room's loop stopped before the request was served.
    #[error("Room closed: {0}")]
    RoomClosed(String),

    /// Signal payload could not be parsed or routed.
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Track metadata lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Rendering backend notification failed.
    #[error("Backend notification failed: {0}")]
    Notifier(String),

    /// Server configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorCode for RoomError {
    fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "room_not_found",
            Self::RoomAlreadyExists { .. } => "room_already_exists",
            Self::RoomClosed(_) => "room_closed",
            Self::InvalidSignal(_) => "invalid_signal",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Catalog(_) => "catalog_error",
            Self::Notifier(_) => "notifier_error",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl RoomError {
    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RoomNotFound(_) => StatusCode::NOT_FOUND,
            Self::RoomAlreadyExists { .. } => StatusCode::CONFLICT,
            Self::RoomClosed(_) => StatusCode::GONE,
            Self::InvalidSignal(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Catalog(_) | Self::Notifier(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::backend::{CatalogResult, NotifierResult};

/// Convenient Result alias for room operations.
pub type RoomResult<T> = Result<T, RoomError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<NotifierError> for RoomError {
    fn from(err: NotifierError) -> Self {
        Self::Notifier(err.to_string())
    }
}

impl From<CatalogError> for RoomError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err.to_string())
    }
}

impl From<SignalError> for RoomError {
    fn from(err: SignalError) -> Self {
        Self::InvalidSignal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_room_maps_to_not_found() {
        let err = RoomError::RoomNotFound("r1".into());
        assert_eq!(err.code(), "room_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn collaborator_failures_map_to_bad_gateway() {
        let err: RoomError = CatalogError::Misaligned {
            expected: 2,
            actual: 1,
        }
        .into();
        assert_eq!(err.code(), "catalog_error");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err: RoomError = NotifierError::HttpStatus(500, "boom".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn unroutable_signal_is_a_client_error() {
        let err: RoomError = SignalError::Unroutable {
            route: "JOIN".into(),
            kind: "playlist",
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("JOIN"));
    }
}
