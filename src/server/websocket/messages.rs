//! WebSocket message types.
//!
//! Defines the generic message envelope format used for all WebSocket communication.
//! Feature-specific payloads are carried as JSON values, allowing extensibility.

use serde::{Deserialize, Serialize};

/// Server -> Client message envelope.
///
/// All messages from server to client use this format. The `msg_type` field
/// is used for routing (e.g., "connected", "snapshot", "delta").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    /// Message type identifier
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Feature-specific payload (JSON value)
    pub payload: serde_json::Value,
}

impl ServerMessage {
    /// Create a new server message with the given type and payload.
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Create a server message with a null payload.
    pub fn empty(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::Value::Null,
        }
    }
}

/// Client -> Server message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    /// Message type identifier
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Feature-specific payload (JSON value)
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// System-level messages (not feature-specific).
pub mod system {
    use serde::{Deserialize, Serialize};

    /// Sent immediately after connection is established.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Connected {
        pub connection_id: u64,
        pub server_version: String,
    }

    /// Error message (server -> client).
    ///
    /// Sent when the server encounters an error processing a client message.
    /// The connection stays usable.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Error {
        pub code: String,
        pub message: String,
    }

    impl Error {
        pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
            Self {
                code: code.into(),
                message: message.into(),
            }
        }
    }
}

/// Reserved message type constants.
pub mod msg_types {
    /// Sent by server on successful connection.
    pub const CONNECTED: &str = "connected";
    /// Client heartbeat request.
    pub const PING: &str = "ping";
    /// Server heartbeat response.
    pub const PONG: &str = "pong";
    /// Server error response.
    pub const ERROR: &str = "error";
    /// Client asks to join a room.
    pub const JOIN_ROOM: &str = "join_room";
    /// Client asks to leave a room.
    pub const LEAVE_ROOM: &str = "leave_room";
    /// Full room contents, sent in reply to every join.
    pub const SNAPSHOT: &str = "snapshot";
    /// Incremental change to one entry of a room.
    pub const DELTA: &str = "delta";
}

/// Error codes carried by `system::Error`.
pub mod error_codes {
    pub const PARSE_ERROR: &str = "parse_error";
    pub const INVALID_PAYLOAD: &str = "invalid_payload";
    pub const INVALID_ROOM: &str = "invalid_room";
    pub const UNKNOWN_TYPE: &str = "unknown_type";
}

/// Room message payloads.
pub mod rooms {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use crate::catalog_store::{CatalogEntry, ChangeKind, RoomKey};

    /// Payload of `join_room` and `leave_room`.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct RoomRequest {
        pub room: RoomKey,
    }

    /// Payload of `snapshot` messages.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct SnapshotMessage {
        pub room: RoomKey,
        pub entries: Vec<Arc<CatalogEntry>>,
    }

    /// Payload of `delta` messages.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct DeltaMessage {
        pub room: RoomKey,
        pub change_kind: ChangeKind,
        pub entry: Arc<CatalogEntry>,
    }
}
