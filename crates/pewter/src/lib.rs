//! # Pewter
//!
//! A chatbot runtime: adapters bridge chat backends, handlers declare routes,
//! and the robot ties them together through a validated configuration tree
//! and a set of lifecycle hooks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  dispatch  ┌────────┐  route   ┌─────────────────────────┐
//! │   Adapter   │───────────▶│ Robot  │─────────▶│ Handler "ping"  (routes)│──▶ actions
//! │ (shell, …)  │◀───────────│        │─────────▶│ Handler "remember"      │──▶ actions
//! └─────────────┘   replies  └────────┘          └─────────────────────────┘
//!                                │ fire
//!                                ▼
//!                              Hooks
//! ```
//!
//! - **Registry**: adapters, handlers, hooks and route guards, plus the configuration tree
//! - **Adapters**: chat backend implementations built from an `AdapterContext`
//! - **Handlers**: named bundles of chat routes, HTTP routes and a config section
//! - **Actions**: async functions stored as `tower` services
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pewter::prelude::*;
//!
//! async fn pong(response: Response) -> Result<(), BoxError> {
//!     response.reply("PONG");
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(Registry::new());
//!     registry.register_adapter_type::<ShellAdapter>()?;
//!     registry.register_handler_with("ping", |h| {
//!         h.route(Route::new(r"(?i)^ping$", "pong", pong).unwrap().command(true))
//!     })?;
//!
//!     Robot::builder(registry, RunMode::Normal).build().run(None).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `shell` *(default)*: the terminal adapter
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use pewter_core as core;
pub use pewter_framework as framework;
pub use pewter_runtime as runtime;

#[cfg(feature = "shell")]
pub use pewter_adapter_shell as shell;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use pewter::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use pewter_runtime::{Registry, Robot, RobotState, RunMode, RuntimeError, RuntimeResult};

    // Handlers and routing
    pub use pewter_framework::{
        BoxError, Handler, HookEvent, HookPayload, HookResult, HttpRequest, HttpResponse,
        HttpRoute, Layer, Response, Route, RouteGuard, action_fn,
    };

    // Core types for adapters and configuration
    pub use pewter_core::{
        Adapter, AdapterContext, AdapterResult, Attribute, ConfigurableAdapter, Message,
        Section, Source, User, ValueKind,
    };

    #[cfg(feature = "shell")]
    pub use pewter_adapter_shell::ShellAdapter;
}
