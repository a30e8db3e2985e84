//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to the room registry.
//! It provides the router construction and server startup functionality.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::BackendNotifier;
use crate::bootstrap::BootstrappedServices;
use crate::events::{BackendEvent, BroadcastEventBridge, EventEmitter};
use crate::protocol_constants::{SERVER_PORT_RANGE_END, SERVER_PORT_RANGE_START};
use crate::services::RoomRegistry;
use crate::state::Config;
use crate::utils::now_millis;

pub mod http;
pub mod response;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
#[derive(Clone)]
pub struct AppState {
    /// Owns every live room.
    pub registry: Arc<RoomRegistry>,
    /// Rendering backend, probed by the health endpoint.
    pub notifier: Arc<dyn BackendNotifier>,
    /// Event bridge feeding WebSocket subscribers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Application configuration.
    pub config: Arc<RwLock<Config>>,
    /// Stops the server when cancelled.
    pub cancel_token: CancellationToken,
    /// Outcome of the last backend probe; `None` before the first one.
    backend_reachable: Arc<Mutex<Option<bool>>>,
    /// Port the server bound to; 0 until listening.
    port: Arc<AtomicU16>,
}

impl AppState {
    /// Builds the API state from the bootstrapped services.
    pub fn new(services: &BootstrappedServices, config: Arc<RwLock<Config>>) -> Self {
        Self {
            registry: Arc::clone(&services.registry),
            notifier: Arc::clone(&services.notifier),
            event_bridge: Arc::clone(&services.event_bridge),
            ws_manager: Arc::clone(&services.ws_manager),
            config,
            cancel_token: services.cancel_token.clone(),
            backend_reachable: Arc::new(Mutex::new(None)),
            port: Arc::new(AtomicU16::new(0)),
        }
    }

    /// Port the server is listening on, once bound.
    pub fn port(&self) -> Option<u16> {
        match self.port.load(Ordering::SeqCst) {
            0 => None,
            port => Some(port),
        }
    }

    /// Records a backend probe outcome, emitting an event when reachability
    /// changed.
    pub(crate) fn record_backend_health(&self, reachable: bool, reason: Option<String>) {
        let previous = self.backend_reachable.lock().replace(reachable);
        if previous == Some(reachable) {
            return;
        }
        if reachable {
            log::info!("[Backend] Reachable");
        } else {
            log::warn!(
                "[Backend] Unreachable: {}",
                reason.as_deref().unwrap_or("unknown")
            );
        }
        self.event_bridge.emit_backend(BackendEvent::HealthChanged {
            reachable,
            reason,
            timestamp: now_millis(),
        });
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Starts the HTTP server on the configured or auto-discovered port.
///
/// Returns once the state's cancellation token is cancelled and in-flight
/// requests have drained.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let preferred_port = state.config.read().preferred_port;
    let (port, listener) = if preferred_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], preferred_port));
        (preferred_port, tokio::net::TcpListener::bind(&addr).await?)
    } else {
        find_available_port(SERVER_PORT_RANGE_START, SERVER_PORT_RANGE_END).await?
    };
    state.port.store(port, Ordering::SeqCst);

    log::info!("[Server] Listening on http://0.0.0.0:{}", port);
    let cancel_token = state.cancel_token.clone();
    let app = http::create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel_token.cancelled().await })
    .await?;

    log::info!("[Server] Stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::bootstrap_services;
    use crate::events::BroadcastEvent;

    #[tokio::test]
    async fn backend_health_changes_are_broadcast_once() {
        let services = bootstrap_services(&Config::default()).unwrap();
        let state = AppState::new(&services, Arc::new(RwLock::new(Config::default())));
        let mut rx = state.event_bridge.subscribe();

        state.record_backend_health(true, None);
        state.record_backend_health(true, None);
        state.record_backend_health(false, Some("connection refused".into()));

        match rx.recv().await.unwrap() {
            BroadcastEvent::Backend(BackendEvent::HealthChanged { reachable, .. }) => {
                assert!(reachable)
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            BroadcastEvent::Backend(BackendEvent::HealthChanged { reachable, reason, .. }) => {
                assert!(!reachable);
                assert_eq!(reason.as_deref(), Some("connection refused"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn port_is_unknown_before_binding() {
        let services = bootstrap_services(&Config::default()).unwrap();
        let state = AppState::new(&services, Arc::new(RwLock::new(Config::default())));
        assert_eq!(state.port(), None);
    }
}
