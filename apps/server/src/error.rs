use std::io::Error as IoError;

use beacon_service::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0:#}")]
    Database(anyhow::Error),
    #[error("Prober setup failed: {0}")]
    Prober(String),
}
