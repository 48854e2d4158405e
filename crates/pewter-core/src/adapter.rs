//! Adapter trait and construction context.
//!
//! An adapter bridges one chat backend to the robot. The runtime builds it
//! from an [`AdapterContext`] once configuration has been validated, then
//! drives it through `run` and `stop`.
//!
//! ```rust,ignore
//! impl ConfigurableAdapter for IrcAdapter {
//!     const NAME: &'static str = "irc";
//!
//!     fn config(section: Section) -> Section {
//!         section.attribute(Attribute::new("server").kind(ValueKind::String).required())
//!     }
//!
//!     fn from_context(ctx: AdapterContext) -> AdapterResult<Self> {
//!         let config: IrcConfig = ctx.config_as()?;
//!         Ok(Self::connect(config, ctx.dispatcher()))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::config::Section;
use crate::error::{AdapterError, AdapterResult};
use crate::message::{Message, RobotIdentity, Source};

/// Receives messages from an adapter.
///
/// Implemented by the runtime's robot; adapters only ever see it as a trait
/// object.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Routes one inbound message to every matching handler.
    async fn dispatch(&self, message: Message);
}

/// Context provided to an adapter when it is constructed.
#[derive(Clone)]
pub struct AdapterContext {
    dispatcher: Arc<dyn Dispatcher>,
    identity: RobotIdentity,
    config: Arc<Value>,
}

impl AdapterContext {
    /// Creates a new adapter context.
    pub fn new(dispatcher: Arc<dyn Dispatcher>, identity: RobotIdentity, config: Value) -> Self {
        Self {
            dispatcher,
            identity,
            config: Arc::new(config),
        }
    }

    /// The sink for inbound messages.
    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    /// The names the robot answers to.
    pub fn identity(&self) -> &RobotIdentity {
        &self.identity
    }

    /// Raw JSON value of the `adapters.<name>` section.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Deserialize the adapter's config section into `T`.
    pub fn config_as<T: DeserializeOwned>(&self) -> AdapterResult<T> {
        T::deserialize(self.config.as_ref())
            .map_err(|e| AdapterError::internal(format!("invalid adapter config: {e}")))
    }
}

impl std::fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterContext")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The core adapter trait.
///
/// Only `run` and `send_messages` are mandatory. Backends without rooms or
/// topics can rely on the defaults, which log a warning and succeed.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter name used in logs.
    fn name(&self) -> &str;

    /// Connects to the backend and receives messages until stopped.
    async fn run(&self) -> AdapterResult<()>;

    /// Asks a running adapter to disconnect.
    async fn stop(&self) -> AdapterResult<()> {
        Ok(())
    }

    /// Sends `strings` to `target`, in order.
    async fn send_messages(&self, target: &Source, strings: &[String]) -> AdapterResult<()>;

    /// Joins a room.
    async fn join(&self, room: &str) -> AdapterResult<()> {
        warn!(adapter = self.name(), room, "join is not implemented by this adapter");
        Ok(())
    }

    /// Leaves a room.
    async fn part(&self, room: &str) -> AdapterResult<()> {
        warn!(adapter = self.name(), room, "part is not implemented by this adapter");
        Ok(())
    }

    /// Sets the topic of the room `target` points at.
    async fn set_topic(&self, target: &Source, topic: &str) -> AdapterResult<()> {
        let _ = (target, topic);
        warn!(adapter = self.name(), "set_topic is not implemented by this adapter");
        Ok(())
    }

    /// Formats `name` as a mention in this backend's syntax.
    fn mention_format(&self, name: &str) -> String {
        format!("{name}:")
    }
}

/// A shared adapter trait object.
pub type BoxedAdapter = Arc<dyn Adapter>;

/// Constructor stored in the registry for each adapter name.
pub type AdapterFactory = Arc<dyn Fn(AdapterContext) -> AdapterResult<BoxedAdapter> + Send + Sync>;

/// Trait for adapters that declare their own configuration section.
pub trait ConfigurableAdapter: Adapter + Sized + 'static {
    /// Registry name, also the name of the `adapters.<name>` config section.
    const NAME: &'static str;

    /// Declares the adapter's configuration attributes on `section`.
    ///
    /// The registry passes an empty `adapters.<name>` section; the default
    /// declares nothing.
    fn config(section: Section) -> Section {
        section
    }

    /// Builds the adapter once configuration is final.
    fn from_context(ctx: AdapterContext) -> AdapterResult<Self>;

    /// A type-erased factory for the registry.
    fn factory() -> AdapterFactory {
        Arc::new(|ctx: AdapterContext| -> AdapterResult<BoxedAdapter> {
            Ok(Arc::new(Self::from_context(ctx)?))
        })
    }
}

/// Adapter registered without an implementation.
///
/// Every operation logs that it is not implemented and performs no I/O.
#[derive(Debug, Clone)]
pub struct StubAdapter {
    name: String,
}

impl StubAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Adapter for StubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> AdapterResult<()> {
        warn!(adapter = %self.name, "This adapter has not implemented run");
        Ok(())
    }

    async fn send_messages(&self, _target: &Source, _strings: &[String]) -> AdapterResult<()> {
        warn!(adapter = %self.name, "This adapter has not implemented send_messages");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::User;

    struct NullDispatcher;

    #[async_trait]
    impl Dispatcher for NullDispatcher {
        async fn dispatch(&self, _message: Message) {}
    }

    #[derive(serde::Deserialize)]
    struct ShellConfig {
        private_chat: bool,
    }

    #[test]
    fn test_context_config_as() {
        let ctx = AdapterContext::new(
            Arc::new(NullDispatcher),
            RobotIdentity::new("Pewter"),
            serde_json::json!({ "private_chat": true }),
        );
        let config: ShellConfig = ctx.config_as().unwrap();
        assert!(config.private_chat);
        assert!(ctx.config_as::<Vec<String>>().is_err());
    }

    #[tokio::test]
    async fn test_stub_adapter_is_inert() {
        let adapter = StubAdapter::new("foo");
        assert_eq!(adapter.name(), "foo");
        adapter.run().await.unwrap();
        adapter
            .send_messages(&Source::new(User::new("1", "Carl")), &["hi".to_string()])
            .await
            .unwrap();
        adapter.join("#lobby").await.unwrap();
        assert_eq!(adapter.mention_format("carl"), "carl:");
    }
}
