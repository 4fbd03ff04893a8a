use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{
    backend::BackendError, keepalive::KeepaliveError, relay::RelayError, session::SessionError,
    store::StoreError,
};

/// Error types for the media bridge.
///
/// Module-level errors convert into this enum so the binary and the CLI
/// can report any failure through a single type.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation error
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// Standard I/O operation error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error with location context
    #[error("failed to parse TOML at '{location}': {details}")]
    TomlParseError {
        /// Location of TOML being parsed (file path or "string")
        location: String,
        /// Parse error details
        details: String,
    },

    /// Persisted store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Backend HTTP failure
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Native media session failure
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Keepalive context lifecycle failure
    #[error(transparent)]
    Keepalive(#[from] KeepaliveError),

    /// Coordinator relay failure
    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// A specialized `Result` type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Creates a TOML parsing error with optional file path context.
    pub fn toml_parse(error: impl std::fmt::Display, path: Option<&Path>) -> Self {
        let location = match path {
            Some(p) => p
                .canonicalize()
                .unwrap_or_else(|_| p.to_path_buf())
                .display()
                .to_string(),
            None => "string".to_string(),
        };

        BridgeError::TomlParseError {
            location,
            details: error.to_string(),
        }
    }

    /// Creates an I/O error carrying the path it happened on.
    pub fn io(error: impl std::fmt::Display, path: &Path) -> Self {
        BridgeError::IoError {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }
}
