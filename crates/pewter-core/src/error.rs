//! Unified error types for the Pewter core.
//!
//! Registration and hook errors live in `pewter-framework`; the runtime wraps
//! everything in its own `RuntimeError`.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Adapter Errors
// =============================================================================

/// Errors raised by chat adapters.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The adapter could not be constructed from its context.
    #[error("failed to build adapter '{name}': {reason}")]
    Build {
        /// Adapter name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Sending outbound messages failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// I/O error on the adapter's connection.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal adapter error.
    #[error("internal adapter error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Creates a build error.
    pub fn build(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Build {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<std::io::Error> for AdapterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by the key-value storage capability.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The backing store could not be reached.
    #[error("could not connect to storage: {0}")]
    Connection(String),

    /// A single operation failed on a reachable store.
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors that can occur while building, loading, or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// An override names an attribute the tree does not declare.
    #[error("Unknown configuration attribute: {0}")]
    UnknownAttribute(String),

    /// A required attribute has no value.
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// An attribute holds a value of the wrong kind or fails its predicate.
    #[error("Invalid configuration for {path}: {message}")]
    Validation { path: String, message: String },

    /// File not found at the specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The user configuration could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    /// Creates a validation error for the attribute at `path`.
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a load error.
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load(message.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
