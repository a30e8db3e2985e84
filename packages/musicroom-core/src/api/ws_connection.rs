//! WebSocket connection tracking.
//!
//! Every open socket holds a [`ConnectionGuard`]. The manager keeps, per
//! connection, the rooms it follows: a fresh connection receives the events
//! of every room, and once it subscribes to a room it only receives events
//! of the rooms it subscribed to. Backend events always go through.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::BroadcastEvent;
use crate::utils::now_millis;

/// Which room events a connection receives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RoomFilter {
    All,
    Only(HashSet<String>),
}

struct Connection {
    connected_at: u64,
    filter: RoomFilter,
}

/// Registry of open WebSocket connections.
pub struct WsConnectionManager {
    connections: DashMap<String, Connection>,
    /// Parent of every connection token. Replaced by `close_all`.
    shutdown: RwLock<CancellationToken>,
}

impl WsConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            shutdown: RwLock::new(CancellationToken::new()),
        }
    }

    /// Opens a connection that follows every room.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        let id = format!("ws-{}", Uuid::new_v4());
        let cancel_token = self.shutdown.read().child_token();
        self.connections.insert(
            id.clone(),
            Connection {
                connected_at: now_millis(),
                filter: RoomFilter::All,
            },
        );
        log::info!(
            "[WS] Connection registered: {} (total: {})",
            id,
            self.connections.len()
        );
        ConnectionGuard {
            id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: &str) {
        if let Some((_, conn)) = self.connections.remove(id) {
            log::info!(
                "[WS] Connection unregistered: {} after {}ms (remaining: {})",
                id,
                now_millis().saturating_sub(conn.connected_at),
                self.connections.len()
            );
        }
    }

    fn subscribe(&self, id: &str, room_id: &str) -> bool {
        let Some(mut conn) = self.connections.get_mut(id) else {
            return false;
        };
        if let RoomFilter::Only(rooms) = &mut conn.filter {
            return rooms.insert(room_id.to_string());
        }
        conn.filter = RoomFilter::Only(HashSet::from([room_id.to_string()]));
        true
    }

    fn unsubscribe(&self, id: &str, room_id: &str) -> bool {
        match self.connections.get_mut(id).as_deref_mut() {
            Some(Connection {
                filter: RoomFilter::Only(rooms),
                ..
            }) => rooms.remove(room_id),
            _ => false,
        }
    }

    fn wants(&self, id: &str, event: &BroadcastEvent) -> bool {
        let BroadcastEvent::Room(event) = event else {
            return true;
        };
        self.connections
            .get(id)
            .is_some_and(|conn| match &conn.filter {
                RoomFilter::All => true,
                RoomFilter::Only(rooms) => rooms.contains(event.room_id()),
            })
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Force-closes every open connection. Later connections are accepted.
    ///
    /// Returns the number of connections that were told to close.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        {
            let mut shutdown = self.shutdown.write();
            shutdown.cancel();
            *shutdown = CancellationToken::new();
        }
        if count > 0 {
            log::info!("[WS] Force-closing {} connection(s)", count);
        }
        count
    }
}

impl Default for WsConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One open connection. Unregisters it when dropped.
pub struct ConnectionGuard {
    id: String,
    manager: Arc<WsConnectionManager>,
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cancelled when the connection must be force-closed.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Follows `room_id`. The first subscription stops events of other rooms.
    ///
    /// Returns `false` if the room was already followed.
    pub fn subscribe(&self, room_id: &str) -> bool {
        self.manager.subscribe(&self.id, room_id)
    }

    /// Stops following `room_id`. Returns `false` if it was not followed.
    pub fn unsubscribe(&self, room_id: &str) -> bool {
        self.manager.unsubscribe(&self.id, room_id)
    }

    /// Whether `event` should be pushed to this connection.
    pub fn wants(&self, event: &BroadcastEvent) -> bool {
        self.manager.wants(&self.id, event)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(&self.id);
    }
}
