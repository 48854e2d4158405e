//! Runtime error types.

use pewter_core::{AdapterError, ConfigError, StorageError};
use pewter_framework::{HookError, HookEvent, RegistrationError};
use thiserror::Error;

use crate::robot::RobotState;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration failed to load or validate.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registration failed.
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Adapter error.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// `robot.adapter` names an adapter that was never registered.
    #[error("Unknown adapter: {0}")]
    UnknownAdapter(String),

    /// A hook callback aborted a lifecycle step.
    #[error("'{event}' hook failed: {source}")]
    Hook {
        event: HookEvent,
        #[source]
        source: HookError,
    },

    /// The operation is not valid in the robot's current state.
    #[error("Cannot {operation} while the robot is {state}")]
    InvalidState {
        operation: &'static str,
        state: RobotState,
    },
}

impl RuntimeError {
    pub fn hook(event: HookEvent, source: HookError) -> Self {
        Self::Hook { event, source }
    }

    pub fn invalid_state(operation: &'static str, state: RobotState) -> Self {
        Self::InvalidState { operation, state }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
