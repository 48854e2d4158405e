//! # Pewter Core
//!
//! The types every other Pewter crate agrees on:
//!
//! - **Messages**: [`Message`], [`Source`], [`User`] and the robot's
//!   [`RobotIdentity`]
//! - **Adapters**: the [`Adapter`] trait, its construction [`AdapterContext`]
//!   and the [`Dispatcher`] seam adapters push messages into
//! - **Storage**: the async [`Storage`] capability with an in-memory backend
//! - **Configuration**: the typed [`ConfigTree`]
//!
//! ```text
//! ┌─────────┐  dispatch  ┌─────────┐  route  ┌─────────┐
//! │ Adapter │───────────▶│  Robot  │────────▶│ Handler │
//! │ (shell) │◀───────────│(runtime)│◀────────│ action  │
//! └─────────┘   replies  └─────────┘ replies └─────────┘
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod message;
pub mod storage;

pub use adapter::{
    Adapter, AdapterContext, AdapterFactory, BoxedAdapter, ConfigurableAdapter, Dispatcher,
    StubAdapter,
};
pub use config::{Attribute, ConfigTree, Section, Validator, ValueKind};
pub use error::{
    AdapterError, AdapterResult, ConfigError, ConfigResult, StorageError, StorageResult,
};
pub use message::{Message, RobotIdentity, Source, User, shell_split};
pub use storage::{BoxedStorage, MemoryStorage, Namespaced, Storage};
