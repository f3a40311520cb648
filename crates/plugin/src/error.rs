//! Host glue errors

use mychunks_core::{ClaimError, ConfigError, StorageError};

/// Errors raised while wiring configuration, storage and the engine
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Claim(#[from] ClaimError),
}

/// Result type for host glue operations
pub type PluginResult<T> = Result<T, PluginError>;
