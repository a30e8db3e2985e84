//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: the single place where the HTTP
//! collaborators, the event bridge and the room registry are instantiated
//! and wired together.

use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::api::WsConnectionManager;
use crate::backend::{BackendNotifier, HttpBackendNotifier, HttpTrackCatalog, TrackCatalog};
use crate::error::{RoomError, RoomResult};
use crate::events::{BroadcastEventBridge, EventEmitter, LoggingEventEmitter};
use crate::rooms::RoomDeps;
use crate::runtime::TokioSpawner;
use crate::services::RoomRegistry;
use crate::state::Config;

/// Container for all bootstrapped services.
///
/// Consumed by [`AppState`](crate::api::AppState) to build the HTTP state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Owns every live room.
    pub registry: Arc<RoomRegistry>,
    /// Rendering backend client, shared with the health endpoint.
    pub notifier: Arc<dyn BackendNotifier>,
    /// Fans room and backend events out to WebSocket subscribers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Tracks WebSocket connections for force-close on shutdown.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown: stops the server and its WebSocket
    /// connections, then every room.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.cancel_token.cancel();

        let connections_closed = self.ws_manager.close_all();
        if connections_closed > 0 {
            log::info!(
                "[Bootstrap] Closed {} WebSocket connection(s)",
                connections_closed
            );
        }

        self.registry.terminate_all().await;
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the HTTP client shared by the backend notifier and the catalog.
fn create_http_client(config: &Config) -> RoomResult<Client> {
    Client::builder()
        .timeout(config.http_timeout())
        .build()
        .map_err(|e| RoomError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Bootstraps all services with their dependencies.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`RoomError::Configuration`] if `config` does not validate or the
/// HTTP client cannot be built.
pub fn bootstrap_services(config: &Config) -> RoomResult<BootstrappedServices> {
    config.validate().map_err(RoomError::Configuration)?;

    let spawner = TokioSpawner::current();
    let http_client = create_http_client(config)?;

    let event_bridge = Arc::new(BroadcastEventBridge::new(config.event_channel_capacity));
    event_bridge.set_secondary_emitter(Arc::new(LoggingEventEmitter));

    let notifier: Arc<dyn BackendNotifier> = Arc::new(HttpBackendNotifier::new(
        http_client.clone(),
        config.backend_url.clone(),
    ));
    let catalog: Arc<dyn TrackCatalog> = Arc::new(HttpTrackCatalog::new(
        http_client,
        config.catalog_url.clone(),
    ));

    let deps = RoomDeps::new(Arc::clone(&notifier), catalog, spawner.clone())
        .with_emitter(Arc::clone(&event_bridge) as Arc<dyn EventEmitter>)
        .with_checkpoint_interval(config.timer_checkpoint_interval())
        .with_signal_capacity(config.signal_channel_capacity);
    let registry = Arc::new(RoomRegistry::new(deps));

    log::info!(
        "[Bootstrap] Backend at {}, catalog at {}",
        config.backend_url,
        config.catalog_url
    );

    Ok(BootstrappedServices {
        registry,
        notifier,
        event_bridge,
        ws_manager: Arc::new(WsConnectionManager::new()),
        spawner,
        cancel_token: CancellationToken::new(),
    })
}
