//! Pewter Runtime - registry, configuration pipeline and robot lifecycle.
//!
//! This crate provides:
//! - The [`Registry`] of adapters, handlers, hooks and route guards
//! - Configuration: built-in defaults, figment-loaded overrides, validation ([`config`])
//! - The [`Robot`], which owns the lifecycle and dispatches inbound messages
//! - Logging configuration ([`logging`])
//! - Locale path registration ([`locale`])
//!
//! ```ignore
//! use std::sync::Arc;
//! use pewter_runtime::{Registry, Robot, RunMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(Registry::new());
//!     registry.register_adapter_type::<ShellAdapter>()?;
//!     registry.register_handler(ping::handler()?);
//!
//!     Robot::builder(registry, RunMode::Normal).build().run(None).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Run modes
//!
//! Fatal conditions (invalid configuration, unknown adapter, unreachable
//! storage) exit the process with status 1 under [`RunMode::Normal`] and are
//! returned as [`RuntimeError`] under [`RunMode::Test`].

pub mod config;
pub mod error;
pub mod locale;
pub mod logging;
pub mod registry;
pub mod robot;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, LogFormat, LogLevel, RobotSettings};
pub use error::{RuntimeError, RuntimeResult};
pub use locale::{LocaleBackend, LocalePaths, NoopLocaleBackend};
pub use logging::{LogOutput, LoggingBuilder};
pub use registry::Registry;
pub use robot::{FatalExit, Robot, RobotBuilder, RobotState, RunMode};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
