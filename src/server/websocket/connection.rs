//! WebSocket connection manager.
//!
//! Tracks all active WebSocket connections and owns their outgoing channels.
//! Each connection also remembers which rooms it has received a snapshot for
//! and, per entry, the last version it was sent, so deltas are never
//! delivered out of version order even when they arrive through different
//! rooms.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, RwLock};

use super::messages::{msg_types, rooms::DeltaMessage, rooms::SnapshotMessage, ServerMessage};
use crate::broadcast::Delta;
use crate::catalog_store::{CatalogEntry, CatalogType, RoomKey, Version};
use crate::server::metrics;

/// Default capacity of a connection's outgoing channel.
pub const DEFAULT_CONNECTION_BUFFER: usize = 64;

/// Opaque identifier of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SendError {
    /// The target connection is not registered.
    NotConnected,
    /// The connection channel is closed (client disconnected).
    Disconnected,
    /// The connection channel is full (client not keeping up).
    Full,
}

/// Result of delivering one delta to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The connection already received this or a newer version.
    Stale,
    /// The connection has no snapshot of the delta's room, either because
    /// it left or because its join has not been answered yet.
    NotInRoom,
    Failed(DeliveryFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    NotConnected,
    ChannelFull,
    ChannelClosed,
}

type EntryKey = (CatalogType, String);

/// Last version of one entry sent to a connection and the rooms it was sent
/// in. Both halves of a partition move carry the same version.
#[derive(Debug)]
struct SentVersion {
    version: Version,
    rooms: HashSet<RoomKey>,
}

/// Outgoing side of one connection.
struct Outbox {
    sender: mpsc::Sender<ServerMessage>,
    /// Rooms answered with a snapshot and not left since.
    rooms: HashSet<RoomKey>,
    delivered: HashMap<EntryKey, SentVersion>,
}

impl Outbox {
    fn new(sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            sender,
            rooms: HashSet::new(),
            delivered: HashMap::new(),
        }
    }

    fn try_send(&self, message: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Disconnected,
        })
    }

    fn is_stale(&self, room: &RoomKey, entry: &CatalogEntry) -> bool {
        let key = (room.catalog_type, entry.id.clone());
        match self.delivered.get(&key) {
            Some(sent) => {
                entry.version < sent.version
                    || (entry.version == sent.version && sent.rooms.contains(room))
            }
            None => false,
        }
    }

    fn record(&mut self, room: &RoomKey, entry: &CatalogEntry) {
        let sent = self
            .delivered
            .entry((room.catalog_type, entry.id.clone()))
            .or_insert_with(|| SentVersion {
                version: entry.version,
                rooms: HashSet::new(),
            });
        if entry.version > sent.version {
            sent.version = entry.version;
            sent.rooms.clear();
        }
        if entry.version == sent.version {
            sent.rooms.insert(room.clone());
        }
    }
}

/// Manages all active WebSocket connections.
pub struct ConnectionManager {
    next_id: AtomicU64,
    buffer: usize,
    /// connection_id -> outbox
    connections: RwLock<HashMap<ConnectionId, Arc<Mutex<Outbox>>>>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECTION_BUFFER)
    }
}

impl ConnectionManager {
    /// Create a new connection manager whose connections buffer up to
    /// `buffer` outgoing messages.
    pub fn new(buffer: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the assigned id and a receiver for outgoing messages. The
    /// caller should forward messages from this receiver to the WebSocket.
    pub async fn register(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);

        let mut conns = self.connections.write().await;
        conns.insert(id, Arc::new(Mutex::new(Outbox::new(tx))));
        metrics::WS_CONNECTIONS.set(conns.len() as f64);

        (id, rx)
    }

    /// Unregister a connection (called on disconnect).
    pub async fn unregister(&self, id: ConnectionId) {
        let mut conns = self.connections.write().await;
        conns.remove(&id);
        metrics::WS_CONNECTIONS.set(conns.len() as f64);
    }

    async fn outbox(&self, id: ConnectionId) -> Option<Arc<Mutex<Outbox>>> {
        self.connections.read().await.get(&id).cloned()
    }

    /// Send a message to a specific connection without waiting.
    pub async fn send_to(&self, id: ConnectionId, message: ServerMessage) -> Result<(), SendError> {
        let outbox = self.outbox(id).await.ok_or(SendError::NotConnected)?;
        let outbox = outbox.lock().await;
        outbox.try_send(message)
    }

    /// Deliver a delta to a connection that holds a snapshot of the delta's
    /// room, unless it already saw this or a newer version of the entry.
    pub async fn deliver_delta(&self, id: ConnectionId, delta: &Delta) -> DeliveryOutcome {
        let Some(outbox) = self.outbox(id).await else {
            return DeliveryOutcome::Failed(DeliveryFailure::NotConnected);
        };
        let mut outbox = outbox.lock().await;

        if !outbox.rooms.contains(&delta.room) {
            return DeliveryOutcome::NotInRoom;
        }
        if outbox.is_stale(&delta.room, &delta.entry) {
            return DeliveryOutcome::Stale;
        }

        let message = ServerMessage::new(
            msg_types::DELTA,
            DeltaMessage {
                room: delta.room.clone(),
                change_kind: delta.kind,
                entry: delta.entry.clone(),
            },
        );
        match outbox.try_send(message) {
            Ok(()) => {
                outbox.record(&delta.room, &delta.entry);
                DeliveryOutcome::Delivered
            }
            Err(SendError::Full) => DeliveryOutcome::Failed(DeliveryFailure::ChannelFull),
            Err(_) => DeliveryOutcome::Failed(DeliveryFailure::ChannelClosed),
        }
    }

    /// Send a room snapshot and start accepting the room's deltas.
    ///
    /// `entries` is evaluated while the connection's outbox is locked, so no
    /// delta for this connection can be sent between computing the snapshot
    /// and enqueueing it. Returns the number of entries sent.
    pub async fn send_snapshot<F>(
        &self,
        id: ConnectionId,
        room: &RoomKey,
        entries: F,
    ) -> Result<usize, SendError>
    where
        F: FnOnce() -> Vec<Arc<CatalogEntry>>,
    {
        let outbox = self.outbox(id).await.ok_or(SendError::NotConnected)?;
        let mut outbox = outbox.lock().await;

        let entries = entries();
        let count = entries.len();
        let message = ServerMessage::new(
            msg_types::SNAPSHOT,
            SnapshotMessage {
                room: room.clone(),
                entries: entries.clone(),
            },
        );
        outbox.try_send(message)?;

        for entry in &entries {
            outbox.record(room, entry);
        }
        outbox.rooms.insert(room.clone());
        Ok(count)
    }

    /// Stop delivering a room's deltas to a connection that left it.
    ///
    /// Entry versions are kept, so rejoining never lets an older version
    /// through.
    pub async fn forget_room(&self, id: ConnectionId, room: &RoomKey) {
        if let Some(outbox) = self.outbox(id).await {
            let mut outbox = outbox.lock().await;
            outbox.rooms.remove(room);
            for sent in outbox.delivered.values_mut() {
                sent.rooms.remove(room);
            }
        }
    }

    /// Drop the version record of a removed entry, if it is not newer than
    /// `version`.
    ///
    /// Only safe once no delta older than `version` can still be delivered
    /// for the entry.
    pub async fn forget_entry(
        &self,
        id: ConnectionId,
        catalog_type: CatalogType,
        entry_id: &str,
        version: Version,
    ) {
        if let Some(outbox) = self.outbox(id).await {
            let mut outbox = outbox.lock().await;
            let key = (catalog_type, entry_id.to_string());
            if outbox.delivered.get(&key).is_some_and(|s| s.version <= version) {
                outbox.delivered.remove(&key);
            }
        }
    }

    /// Number of entries whose last delivered version is remembered.
    pub async fn tracked_entries(&self, id: ConnectionId) -> usize {
        match self.outbox(id).await {
            Some(outbox) => outbox.lock().await.delivered.len(),
            None => 0,
        }
    }

    /// Check if a connection is registered.
    pub async fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Get the total number of active connections.
    pub async fn total_connections(&self) -> usize {
        self.connections.read().await.len()
    }
}
