//! HTTP response helpers for consistent API responses.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

/// Success response with JSON data.
pub fn api_success<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(data))
}

/// A room was created; the body is its initial exposed state.
pub fn api_created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(data))
}

/// A signal was queued to its room. Its effects are observable through
/// queries and events, not through this response.
pub fn api_accepted() -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(json!({ "accepted": true })))
}

/// Error response with code and message.
pub fn api_error(
    status: StatusCode,
    code: &str,
    message: impl std::fmt::Display,
) -> impl IntoResponse {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.to_string()
        })),
    )
}
