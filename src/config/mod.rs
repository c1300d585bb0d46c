mod file_config;

pub use file_config::{DispatchConfig, FileConfig};

use crate::broadcast::DEFAULT_ROOM_QUEUE_CAPACITY;
use crate::server::websocket::connection::DEFAULT_CONNECTION_BUFFER;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub seed_file: Option<PathBuf>,
    pub room_queue_capacity: usize,
    pub connection_buffer: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::default(),
            seed_file: None,
            room_queue_capacity: DEFAULT_ROOM_QUEUE_CAPACITY,
            connection_buffer: DEFAULT_CONNECTION_BUFFER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub seed_file: Option<PathBuf>,

    // Feature configs (with defaults)
    pub dispatch: DispatchSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub room_queue_capacity: usize,
    pub connection_buffer: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            room_queue_capacity: DEFAULT_ROOM_QUEUE_CAPACITY,
            connection_buffer: DEFAULT_CONNECTION_BUFFER,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let seed_file = file
            .seed_file
            .map(PathBuf::from)
            .or_else(|| cli.seed_file.clone());
        if let Some(path) = &seed_file {
            if !path.is_file() {
                bail!("Seed file does not exist: {:?}", path);
            }
        }

        let dispatch_file = file.dispatch.unwrap_or_default();
        let dispatch = DispatchSettings {
            room_queue_capacity: dispatch_file
                .room_queue_capacity
                .unwrap_or(cli.room_queue_capacity),
            connection_buffer: dispatch_file
                .connection_buffer
                .unwrap_or(cli.connection_buffer),
        };
        if dispatch.room_queue_capacity == 0 {
            bail!("room_queue_capacity must be greater than 0");
        }
        if dispatch.connection_buffer == 0 {
            bail!("connection_buffer must be greater than 0");
        }

        Ok(Self {
            port,
            metrics_port,
            logging_level,
            seed_file,
            dispatch,
        })
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
