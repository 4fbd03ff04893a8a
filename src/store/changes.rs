use std::{path::PathBuf, time::Instant};

use serde_json::Value;

/// Where a storage change originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// Written through this process's store handle
    Local,
    /// Picked up from the store file after another process wrote it
    FileEdit,
}

/// A change to one store key.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    /// Store key that changed (e.g. "baseUrl").
    pub key: String,
    /// The previous value, if the key existed.
    pub old_value: Option<Value>,
    /// The new value, `None` if the key was removed.
    pub new_value: Option<Value>,
    /// Timestamp when the change was observed.
    pub timestamp: Instant,
    /// Origin of the change.
    pub source: ChangeSource,
}

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The value type does not match the expected type for the key.
    #[error("type mismatch at '{key}': expected {expected_type}")]
    TypeMismatch {
        /// Key whose value did not match.
        key: String,
        /// The expected type name.
        expected_type: &'static str,
    },

    /// Error occurred while persisting the store to disk
    #[error("failed to persist store to '{path}': {details}")]
    PersistenceError {
        /// Path where persistence failed
        path: PathBuf,
        /// Error details from the persistence operation
        details: String,
    },

    /// Error occurred while serializing a value
    #[error("failed to serialize {content_type}: {details}")]
    SerializationError {
        /// Type of content being serialized
        content_type: String,
        /// Serialization error details
        details: String,
    },

    /// Failed to parse the store file
    #[error("failed to parse store file '{path}': {details}")]
    ParseError {
        /// Store file path
        path: PathBuf,
        /// Parse error details
        details: String,
    },

    /// Failed to initialize file watcher
    #[error("failed to initialize file watcher: {details}")]
    FileWatcherInitError {
        /// File watcher initialization error details
        details: String,
    },

    /// Error occurred during file I/O operations
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// A required service is unavailable
    #[error("{service} service unavailable: {details}")]
    ServiceUnavailable {
        /// Name of the service that is unavailable
        service: String,
        /// Details about why the service is unavailable
        details: String,
    },
}

impl StorageChange {
    /// Creates a locally originated change.
    pub fn new(key: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
            timestamp: Instant::now(),
            source: ChangeSource::Local,
        }
    }

    /// Extracts the new value as a specific type.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TypeMismatch` if the value is absent or cannot be
    /// deserialized into the requested type.
    pub fn extract<T>(&self) -> Result<T, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mismatch = || StoreError::TypeMismatch {
            key: self.key.clone(),
            expected_type: std::any::type_name::<T>(),
        };

        let value = self.new_value.clone().ok_or_else(mismatch)?;
        serde_json::from_value(value).map_err(|_| mismatch())
    }

    /// Attempts to extract the new value as a string.
    pub fn as_string(&self) -> Option<String> {
        match &self.new_value {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Extracts the new value as a string with a fallback default.
    ///
    /// Removed keys and non-string values both yield the default.
    pub fn as_string_or(&self, default: &str) -> String {
        self.as_string().unwrap_or_else(|| default.to_string())
    }
}
