//! WebSocket helpers for end-to-end tests

use super::constants::*;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connect to the WebSocket endpoint and consume the `connected` message.
pub async fn connect_ws(base_url: &str) -> WsStream {
    // Convert http:// to ws://
    let ws_url = base_url.replace("http://", "ws://") + "/v1/ws";

    let (mut ws_stream, _) = connect_async(ws_url.as_str())
        .await
        .expect("Failed to connect to WebSocket");

    let connected = wait_for_message(&mut ws_stream, "connected").await;
    assert!(connected.is_some(), "Should receive connected message");

    ws_stream
}

/// Send a raw JSON message.
pub async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send WebSocket message");
}

/// Send `join_room` and return the `snapshot` that answers it.
pub async fn join_room(ws: &mut WsStream, catalog_type: &str, partition: &str) -> Value {
    send_json(
        ws,
        json!({
            "type": "join_room",
            "payload": {"room": {"catalog_type": catalog_type, "partition": partition}}
        }),
    )
    .await;
    wait_for_message(ws, "snapshot")
        .await
        .expect("Should receive snapshot after join")
}

pub async fn leave_room(ws: &mut WsStream, catalog_type: &str, partition: &str) {
    send_json(
        ws,
        json!({
            "type": "leave_room",
            "payload": {"room": {"catalog_type": catalog_type, "partition": partition}}
        }),
    )
    .await;
}

/// Wait for a specific message type, skipping others, with the default timeout.
pub async fn wait_for_message(ws: &mut WsStream, expected_type: &str) -> Option<Value> {
    let result = timeout(Duration::from_millis(WS_MESSAGE_TIMEOUT_MS), async {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if let Ok(json) = serde_json::from_str::<Value>(&text) {
                    if json.get("type").and_then(|t| t.as_str()) == Some(expected_type) {
                        return Some(json);
                    }
                }
            }
        }
        None
    })
    .await;

    result.ok().flatten()
}

/// Assert that no text message arrives within a short window.
pub async fn assert_no_message(ws: &mut WsStream) {
    let result = timeout(Duration::from_millis(WS_SILENCE_TIMEOUT_MS), async {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                return Some(text.to_string());
            }
        }
        None
    })
    .await;

    if let Ok(Some(text)) = result {
        panic!("Expected no message, got {}", text);
    }
}
