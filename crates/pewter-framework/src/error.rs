//! Error types for the Pewter framework.

use thiserror::Error;

/// Errors raised while declaring or registering handlers and adapters.
///
/// A failed registration never mutates the registry.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// The name was empty after trimming.
    #[error("{kind} registration requires a non-blank name")]
    BlankName {
        /// What was being registered ("adapter", "handler").
        kind: &'static str,
    },

    /// A route pattern failed to compile.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        /// The compiler's message.
        reason: String,
    },

    /// An HTTP route path was not absolute.
    #[error("invalid HTTP path '{0}': paths must start with '/'")]
    InvalidPath(String),
}

impl RegistrationError {
    pub fn blank_name(kind: &'static str) -> Self {
        Self::BlankName { kind }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, err: &regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: err.to_string(),
        }
    }
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Returned by a hook callback to abort the lifecycle step that fired it.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type for hook callbacks.
pub type HookResult<T> = Result<T, HookError>;
