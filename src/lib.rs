//! Kisan Sync Server Library
//!
//! Real-time catalog sync: an in-memory versioned catalog, room-scoped
//! broadcast of committed changes, and snapshot-on-join reconciliation.
//! This library exposes the internal modules for testing and potential reuse.

pub mod broadcast;
pub mod catalog_store;
pub mod config;
pub mod filter;
pub mod server;

// Re-export commonly used types for convenience
pub use broadcast::{BroadcastDispatcher, ReconnectSync, RoomRegistry};
pub use catalog_store::{CatalogStore, InMemoryCatalogStore};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
