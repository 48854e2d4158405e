//! Configuration pipeline for the Pewter runtime.
//!
//! The tree itself lives in `pewter-core`. This module supplies the built-in
//! defaults, the figment-based user override loader, typed views over the
//! `robot`, `storage` and `http` sections, and validation.

pub mod defaults;
pub mod loader;
pub mod schema;
pub mod validation;

pub use defaults::{LOG_FORMATS, LOG_LEVELS, default_tree};
pub use loader::ConfigLoader;
pub use pewter_core::{ConfigError, ConfigResult, ConfigTree};
pub use schema::{HttpSettings, LogFormat, LogLevel, RobotSettings, StorageSettings};
pub use validation::{validate, violations};
