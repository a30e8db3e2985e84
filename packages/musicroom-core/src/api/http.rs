//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the room registry.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::response::{api_accepted, api_created, api_error, api_success};
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::error::RoomResult;
use crate::protocol_constants::SERVICE_ID;
use crate::rooms::listening::ListeningRoomParams;
use crate::rooms::playlist::PlaylistParams;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state);
    Router::new()
        .route("/health", get(health_check))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/listening", post(create_listening_room))
        .route("/api/rooms/playlist", post(create_playlist_room))
        .route("/api/rooms/{id}", get(get_room))
        .route("/api/rooms/{id}/signals", post(post_signal))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS restricted to the configured trusted origin prefixes.
fn cors_layer(state: &AppState) -> CorsLayer {
    let trusted_origins = state.config.read().trusted_origins.clone();
    log::info!("[Server] CORS trusted origins: {:?}", trusted_origins);

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let origin = origin.to_str().unwrap_or("");
            trusted_origins
                .iter()
                .any(|allowed| origin.starts_with(allowed.as_str()))
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(false)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe.
///
/// Always returns 200 while the process serves requests. The rendering
/// backend is pinged on every call and its reachability reported alongside;
/// reachability changes are broadcast as backend events.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let reachable = match state.notifier.ping().await {
        Ok(()) => {
            state.record_backend_health(true, None);
            true
        }
        Err(e) => {
            state.record_backend_health(false, Some(e.to_string()));
            false
        }
    };

    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "backend": { "reachable": reachable },
        "rooms": state.registry.len(),
    }))
}

async fn list_rooms(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.registry.list())
}

async fn create_listening_room(
    State(state): State<AppState>,
    Json(params): Json<ListeningRoomParams>,
) -> RoomResult<impl IntoResponse> {
    let exposed = state.registry.create_listening_room(params).await?;
    Ok(api_created(exposed))
}

async fn create_playlist_room(
    State(state): State<AppState>,
    Json(params): Json<PlaylistParams>,
) -> RoomResult<impl IntoResponse> {
    let exposed = state.registry.create_playlist_room(params).await?;
    Ok(api_created(exposed))
}

async fn get_room(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> RoomResult<impl IntoResponse> {
    let snapshot = state.registry.query(&room_id).await?;
    Ok(api_success(snapshot))
}

/// Delivers a route-tagged signal.
///
/// The body must be a JSON object; anything else is refused before the
/// registry sees it.
async fn post_signal(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(raw): Json<serde_json::Value>,
) -> axum::response::Response {
    if !raw.is_object() {
        return api_error(
            StatusCode::BAD_REQUEST,
            "invalid_signal",
            "signal must be a JSON object",
        )
        .into_response();
    }
    match state.registry.signal(&room_id, raw).await {
        Ok(()) => api_accepted().into_response(),
        Err(e) => e.into_response(),
    }
}
