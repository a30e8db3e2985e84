//! Cloneable handle to a running room loop.

use tokio::sync::{mpsc, oneshot};

use super::{RoomKind, RoomSnapshot, Signal};
use crate::error::{RoomError, RoomResult};

pub(crate) type QueryReply = oneshot::Sender<RoomSnapshot>;

/// Receiving side of a room's inbound channels, owned by its loop.
pub(crate) struct Inbox {
    pub signals: mpsc::Receiver<Signal>,
    pub queries: mpsc::Receiver<QueryReply>,
}

/// Handle used to signal and query a room.
///
/// Dropping every handle closes the room's inbox, which ends its loop.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: String,
    kind: RoomKind,
    signals: mpsc::Sender<Signal>,
    queries: mpsc::Sender<QueryReply>,
}

pub(crate) fn channel(
    room_id: &str,
    kind: RoomKind,
    signal_capacity: usize,
    query_capacity: usize,
) -> (RoomHandle, Inbox) {
    let (signal_tx, signal_rx) = mpsc::channel(signal_capacity);
    let (query_tx, query_rx) = mpsc::channel(query_capacity);
    let handle = RoomHandle {
        room_id: room_id.to_string(),
        kind,
        signals: signal_tx,
        queries: query_tx,
    };
    let inbox = Inbox {
        signals: signal_rx,
        queries: query_rx,
    };
    (handle, inbox)
}

impl RoomHandle {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    /// Enqueues a signal. Signals are processed in the order they are sent.
    pub async fn send(&self, signal: Signal) -> RoomResult<()> {
        self.signals
            .send(signal)
            .await
            .map_err(|_| RoomError::RoomClosed(self.room_id.clone()))
    }

    /// Returns a snapshot of the room's exposed state.
    ///
    /// The snapshot reflects every signal and completion the loop applied
    /// before answering.
    pub async fn query(&self) -> RoomResult<RoomSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.queries
            .send(reply_tx)
            .await
            .map_err(|_| RoomError::RoomClosed(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::RoomClosed(self.room_id.clone()))
    }

    /// Whether the room's loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.signals.is_closed()
    }

    /// Resolves once the room's loop has stopped.
    pub async fn closed(&self) {
        self.signals.closed().await;
    }
}
