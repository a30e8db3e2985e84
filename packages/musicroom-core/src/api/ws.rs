//! WebSocket endpoint.
//!
//! A connection first receives a `CONNECTED` frame listing the live rooms.
//! Afterwards broadcast events are pushed as they happen: those of every
//! room until the client subscribes to specific rooms, and backend events
//! always. The client may also send signals, queries and heartbeats.
//! Connections silent for longer than the heartbeat timeout are closed.

use std::time::{Duration, Instant};

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::api::ws_connection::ConnectionGuard;
use crate::api::AppState;
use crate::error::{ErrorCode, RoomError};
use crate::protocol_constants::{WS_HEARTBEAT_CHECK_INTERVAL_SECS, WS_HEARTBEAT_TIMEOUT_SECS};
use crate::rooms::RoomSnapshot;
use crate::services::RoomSummary;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Message Types
// ─────────────────────────────────────────────────────────────────────────────

/// Incoming WebSocket message envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsIncoming {
    Heartbeat,
    /// A route-tagged signal for one room.
    Signal {
        #[serde(rename = "roomID")]
        room_id: String,
        signal: serde_json::Value,
    },
    Query {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    Subscribe {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    Unsubscribe {
        #[serde(rename = "roomID")]
        room_id: String,
    },
}

/// Replies to client frames. Broadcast events are sent as-is.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsOutgoing {
    Connected {
        #[serde(rename = "connectionID")]
        connection_id: String,
        rooms: Vec<RoomSummary>,
    },
    HeartbeatAck,
    SignalAccepted {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    RoomState {
        #[serde(rename = "roomID")]
        room_id: String,
        state: RoomSnapshot,
    },
    Subscribed {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    Unsubscribed {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    Error {
        code: &'static str,
        message: String,
        #[serde(rename = "roomID", skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },
}

impl WsOutgoing {
    fn room_error(room_id: String, err: RoomError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
            room_id: Some(room_id),
        }
    }
}

fn to_message<T: Serialize>(value: &T) -> Option<Message> {
    serde_json::to_string(value)
        .ok()
        .map(|s| Message::Text(s.into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Answers one text frame.
async fn handle_text(state: &AppState, conn: &ConnectionGuard, text: &str) -> WsOutgoing {
    let incoming = match serde_json::from_str::<WsIncoming>(text) {
        Ok(incoming) => incoming,
        Err(e) => {
            log::debug!("[WS] Ignoring malformed frame: {}", e);
            return WsOutgoing::Error {
                code: "invalid_message",
                message: e.to_string(),
                room_id: None,
            };
        }
    };

    match incoming {
        WsIncoming::Heartbeat => WsOutgoing::HeartbeatAck,
        WsIncoming::Signal { room_id, signal } => {
            match state.registry.signal(&room_id, signal).await {
                Ok(()) => WsOutgoing::SignalAccepted { room_id },
                Err(e) => WsOutgoing::room_error(room_id, e),
            }
        }
        WsIncoming::Query { room_id } => match state.registry.query(&room_id).await {
            Ok(snapshot) => WsOutgoing::RoomState {
                room_id,
                state: snapshot,
            },
            Err(e) => WsOutgoing::room_error(room_id, e),
        },
        WsIncoming::Subscribe { room_id } => match state.registry.ensure_live(&room_id) {
            Ok(()) => {
                if conn.subscribe(&room_id) {
                    log::debug!("[WS] {} subscribed to {}", conn.id(), room_id);
                }
                WsOutgoing::Subscribed { room_id }
            }
            Err(e) => WsOutgoing::room_error(room_id, e),
        },
        WsIncoming::Unsubscribe { room_id } => {
            conn.unsubscribe(&room_id);
            WsOutgoing::Unsubscribed { room_id }
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Main WebSocket connection handler.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.event_bridge.subscribe());
    let mut last_activity = Instant::now();

    let conn_guard = state.ws_manager.register();
    let cancel_token = conn_guard.cancel_token().clone();

    let connected = WsOutgoing::Connected {
        connection_id: conn_guard.id().to_string(),
        rooms: state.registry.list(),
    };
    if let Some(msg) = to_message(&connected) {
        if sender.send(msg).await.is_err() {
            log::warn!("[WS] Failed to send room list, client disconnected");
            return;
        }
    }

    let mut heartbeat_interval =
        tokio::time::interval(Duration::from_secs(WS_HEARTBEAT_CHECK_INTERVAL_SECS));
    heartbeat_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: {}", conn_guard.id());
                break;
            }
            msg = receiver.next() => {
                last_activity = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text(&state, &conn_guard, text.as_str()).await;
                        if let Some(msg) = to_message(&reply) {
                            if sender.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            event = events.next() => match event {
                Some(Ok(event)) if conn_guard.wants(&event) => {
                    if let Some(msg) = to_message(&event) {
                        if sender.send(msg).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    log::warn!("[WS] {} lagged, skipped {} event(s)", conn_guard.id(), skipped);
                }
                None => break,
            },
            _ = heartbeat_interval.tick() => {
                if last_activity.elapsed() > Duration::from_secs(WS_HEARTBEAT_TIMEOUT_SECS) {
                    log::warn!("[WS] Heartbeat timeout: {}", conn_guard.id());
                    break;
                }
            }
        }
    }

    let _ = sender.close().await;
}
