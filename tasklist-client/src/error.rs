//! Error types for the client binary.

use crate::config::ConfigError;
use tasklist_core::SyncError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
    #[error("{0}")]
    Usage(String),
}
