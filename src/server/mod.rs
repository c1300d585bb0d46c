mod catalog_routes;
pub mod config;
mod http_layers;
pub mod metrics;
pub mod server;
pub mod state;
pub mod websocket;

pub use catalog_routes::MutationResponse;
pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server, ServerStats};
pub use state::ServerState;
