//! WebSocket route handler.
//!
//! Handles WebSocket upgrade, message loop, and cleanup.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::{
    connection::{ConnectionId, ConnectionManager},
    messages::{error_codes, msg_types, rooms::RoomRequest, system, ClientMessage, ServerMessage},
};
use crate::broadcast::{JoinError, ReconnectSync};
use crate::server::state::{GuardedConnectionManager, GuardedReconnectSync};

/// State needed for WebSocket handling (internal).
struct WsState {
    connection_manager: Arc<ConnectionManager>,
    reconnect: Arc<ReconnectSync>,
}

/// Version string announced in the `connected` message.
pub fn server_version() -> String {
    format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))
}

/// WebSocket upgrade handler.
///
/// This is the route handler for `GET /v1/ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(connection_manager): State<GuardedConnectionManager>,
    State(reconnect): State<GuardedReconnectSync>,
) -> Response {
    let state = Arc::new(WsState {
        connection_manager,
        reconnect,
    });
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    // Register connection and get receiver for outgoing messages
    let (connection_id, outgoing_rx) = state.connection_manager.register().await;
    debug!("WebSocket connected: {}", connection_id);

    let (ws_sink, ws_stream) = socket.split();

    // Send connected message
    let connected_msg = ServerMessage::new(
        msg_types::CONNECTED,
        system::Connected {
            connection_id: connection_id.0,
            server_version: server_version(),
        },
    );

    // Spawn task to forward outgoing messages to WebSocket
    let outgoing_handle = tokio::spawn(forward_outgoing(ws_sink, outgoing_rx, connected_msg));

    // Process incoming messages
    process_incoming(ws_stream, connection_id, &state).await;

    // Cleanup
    debug!("WebSocket disconnected: {}", connection_id);
    outgoing_handle.abort();
    state.reconnect.disconnect(connection_id).await;
}

/// Forward messages from the outgoing channel to the WebSocket.
async fn forward_outgoing(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outgoing_rx: mpsc::Receiver<ServerMessage>,
    initial_msg: ServerMessage,
) {
    // Send initial connected message
    if let Ok(json) = serde_json::to_string(&initial_msg) {
        if ws_sink.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    // Forward all subsequent messages
    while let Some(msg) = outgoing_rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to serialize WebSocket message: {}", e);
            }
        }
    }
}

/// Process incoming messages from the WebSocket.
async fn process_incoming(
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    connection_id: ConnectionId,
    state: &WsState,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    handle_client_message(connection_id, msg, state).await;
                }
                Err(e) => {
                    debug!("Failed to parse client message: {}", e);
                    send_error(
                        connection_id,
                        error_codes::PARSE_ERROR,
                        format!("Invalid message format: {}", e),
                        state,
                    )
                    .await;
                }
            },
            Ok(Message::Binary(_)) => {
                debug!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                // Axum/tungstenite handles pong automatically
                debug!("Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!("Received pong");
            }
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }
}

/// Handle a parsed client message.
async fn handle_client_message(connection_id: ConnectionId, msg: ClientMessage, state: &WsState) {
    match msg.msg_type.as_str() {
        msg_types::PING => {
            let _ = state
                .connection_manager
                .send_to(connection_id, ServerMessage::empty(msg_types::PONG))
                .await;
        }
        msg_types::JOIN_ROOM => {
            let Some(request) = parse_room_request(connection_id, msg.payload, state).await else {
                return;
            };
            match state.reconnect.join(connection_id, &request.room).await {
                Ok(_) => {}
                Err(JoinError::InvalidRoom(reason)) => {
                    warn!("Rejected join of {} to {}: {}", connection_id, request.room, reason);
                    send_error(connection_id, error_codes::INVALID_ROOM, reason, state).await;
                }
                Err(e) => {
                    debug!("Join of {} to {} failed: {}", connection_id, request.room, e);
                }
            }
        }
        msg_types::LEAVE_ROOM => {
            if let Some(request) = parse_room_request(connection_id, msg.payload, state).await {
                state.reconnect.leave(connection_id, &request.room).await;
            }
        }
        other => {
            debug!("Unknown message type: {}", other);
            send_error(
                connection_id,
                error_codes::UNKNOWN_TYPE,
                format!("Unknown message type: {}", other),
                state,
            )
            .await;
        }
    }
}

/// Parse a `join_room`/`leave_room` payload, replying with an error if it is malformed.
///
/// A payload that carries a `room` the server cannot interpret is an invalid
/// room; anything else is an invalid payload.
async fn parse_room_request(
    connection_id: ConnectionId,
    payload: serde_json::Value,
    state: &WsState,
) -> Option<RoomRequest> {
    let has_room = payload.get("room").is_some_and(|room| room.is_object());
    match serde_json::from_value::<RoomRequest>(payload) {
        Ok(request) => Some(request),
        Err(e) => {
            let code = if has_room {
                error_codes::INVALID_ROOM
            } else {
                error_codes::INVALID_PAYLOAD
            };
            send_error(connection_id, code, format!("Invalid room request: {}", e), state).await;
            None
        }
    }
}

async fn send_error(
    connection_id: ConnectionId,
    code: &str,
    message: impl Into<String>,
    state: &WsState,
) {
    let error_msg = ServerMessage::new(msg_types::ERROR, system::Error::new(code, message));
    let _ = state.connection_manager.send_to(connection_id, error_msg).await;
}
