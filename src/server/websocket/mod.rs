//! WebSocket infrastructure for real-time room sync.
//!
//! Clients connect to `GET /v1/ws`, join rooms, and receive a snapshot per
//! join followed by deltas for every committed change in those rooms.

pub mod connection;
pub mod handler;
pub mod messages;

pub use connection::{ConnectionId, ConnectionManager};
pub use handler::ws_handler;
pub use messages::{ClientMessage, ServerMessage};
