//! The robot: configuration lifecycle, adapter supervision and message dispatch.
//!
//! # Lifecycle
//!
//! ```text
//! Unconfigured ──load_config──▶ Configuring ──▶ Ready ──start──▶ Running ──stop──▶ Stopped
//!                                    │                              │
//!                                    └──────────▶ Failed ◀──────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = Arc::new(Registry::new());
//! registry.register_adapter_type::<ShellAdapter>()?;
//! registry.register_handler(ping_handler()?);
//!
//! let robot = Robot::builder(registry, RunMode::Normal).build();
//! robot.run(Some(Path::new("pewter.toml"))).await?;
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use pewter_core::{
    AdapterContext, BoxedAdapter, BoxedStorage, ConfigTree, Dispatcher, MemoryStorage, Message,
    Namespaced, RobotIdentity, Section, Source,
};
use pewter_framework::{
    BoxedGuard, HookEvent, HookPayload, HookResult, HttpRouter, Reply, Response, RestrictionGuard,
    RouteMatch, Router, UserStore, normalize_name,
};
use serde_json::Value;
use tokio::signal;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use crate::config::{self, ConfigLoader, RobotSettings, StorageSettings};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::registry::Registry;

/// How the robot reacts to fatal conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Log one error line and exit the process with status 1.
    Normal,
    /// Return the error to the caller.
    Test,
}

/// Where the robot is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotState {
    Unconfigured,
    Configuring,
    Ready,
    Running,
    Stopped,
    Failed,
}

impl RobotState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Configuring => "configuring",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called with the exit status on a fatal condition in [`RunMode::Normal`].
pub type FatalExit = fn(i32) -> !;

// =============================================================================
// RobotBuilder
// =============================================================================

/// Builder for [`Robot`].
pub struct RobotBuilder {
    registry: Arc<Registry>,
    mode: RunMode,
    loader: ConfigLoader,
    storage: Option<BoxedStorage>,
    http_router: Option<Arc<dyn HttpRouter>>,
    exit: FatalExit,
}

impl RobotBuilder {
    /// The loader user overrides are read with. Defaults to [`ConfigLoader::new`].
    pub fn config_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// The backing store. Defaults to an in-memory store.
    ///
    /// Keys are always prefixed with `storage.namespace`.
    pub fn storage(mut self, storage: BoxedStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Where handler HTTP routes are mounted at start.
    pub fn http_router(mut self, router: Arc<dyn HttpRouter>) -> Self {
        self.http_router = Some(router);
        self
    }

    /// Replaces `std::process::exit` for [`RunMode::Normal`].
    pub fn on_fatal_exit(mut self, exit: FatalExit) -> Self {
        self.exit = exit;
        self
    }

    pub fn build(self) -> Robot {
        Robot {
            inner: Arc::new(RobotInner {
                registry: self.registry,
                mode: self.mode,
                loader: self.loader,
                storage: self
                    .storage
                    .unwrap_or_else(|| Arc::new(MemoryStorage::new())),
                http_router: self.http_router,
                exit: self.exit,
                state: Mutex::new(RobotState::Unconfigured),
                config_path: Mutex::new(None),
                session: RwLock::new(None),
            }),
        }
    }
}

// =============================================================================
// Robot
// =============================================================================

/// Everything built at start and dropped on reset.
struct Session {
    adapter: BoxedAdapter,
    router: Router,
    identity: RobotIdentity,
    users: UserStore,
    restrictions: BoxedGuard,
}

struct RobotInner {
    registry: Arc<Registry>,
    mode: RunMode,
    loader: ConfigLoader,
    storage: BoxedStorage,
    http_router: Option<Arc<dyn HttpRouter>>,
    exit: FatalExit,
    state: Mutex<RobotState>,
    config_path: Mutex<Option<PathBuf>>,
    session: RwLock<Option<Arc<Session>>>,
}

/// A chat robot. Cloning shares the same robot.
#[derive(Clone)]
pub struct Robot {
    inner: Arc<RobotInner>,
}

impl Robot {
    /// Starts building a robot over `registry`.
    pub fn builder(registry: Arc<Registry>, mode: RunMode) -> RobotBuilder {
        RobotBuilder {
            registry,
            mode,
            loader: ConfigLoader::new(),
            storage: None,
            http_router: None,
            exit: std::process::exit,
        }
    }

    pub fn state(&self) -> RobotState {
        *self.inner.state.lock()
    }

    pub fn mode(&self) -> RunMode {
        self.inner.mode
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// The configuration snapshot.
    pub fn config(&self) -> Arc<ConfigTree> {
        self.inner.registry.config()
    }

    /// The names the robot answers to, once running.
    pub fn identity(&self) -> Option<RobotIdentity> {
        self.session().map(|s| s.identity.clone())
    }

    fn set_state(&self, state: RobotState) {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), state);
        debug!(from = %previous, to = %state, "Robot state changed");
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.inner.session.read().clone()
    }

    fn running_session(&self, operation: &'static str) -> RuntimeResult<Arc<Session>> {
        match (self.state(), self.session()) {
            (RobotState::Running, Some(session)) => Ok(session),
            (state, _) => Err(RuntimeError::invalid_state(operation, state)),
        }
    }

    /// Marks the robot failed and handles `error` according to the run mode.
    ///
    /// In [`RunMode::Normal`] this does not return.
    fn fatal(&self, error: impl Into<RuntimeError>) -> RuntimeError {
        let error = error.into();
        self.set_state(RobotState::Failed);
        self.init_logging();
        error!(error = %error, "Fatal error");
        if self.inner.mode == RunMode::Normal {
            (self.inner.exit)(1);
        }
        error
    }

    /// Installs the global subscriber from the `robot` section, or from the
    /// built-in defaults when that section does not deserialize.
    fn init_logging(&self) {
        match self.inner.registry.config().section_as::<RobotSettings>("robot") {
            Ok(robot) => logging::init_from_settings(&robot),
            Err(_) => logging::init_default(),
        }
    }

    fn fire_fatal(&self, event: HookEvent, payload: &HookPayload) -> RuntimeResult<()> {
        self.inner
            .registry
            .fire(&event, payload)
            .map_err(|e| self.fatal(RuntimeError::hook(event, e)))
    }

    fn startup_payload(&self) -> HookPayload {
        HookPayload::Startup {
            config_path: self.inner.config_path.lock().clone(),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Builds, overrides and validates the configuration.
    ///
    /// Fires `before_run` before validation and `config_finalized` after it.
    /// When validation fails `config_finalized` never fires.
    pub fn load_config(&self, path: Option<&Path>) -> RuntimeResult<()> {
        match self.state() {
            RobotState::Unconfigured | RobotState::Ready => {}
            state => return Err(RuntimeError::invalid_state("load configuration", state)),
        }
        self.set_state(RobotState::Configuring);
        *self.inner.config_path.lock() = path.map(Path::to_path_buf);

        let registry = &self.inner.registry;
        let overrides = self
            .inner
            .loader
            .clone()
            .maybe_file(path)
            .load()
            .map_err(|e| self.fatal(e))?;
        registry
            .configure(|tree| tree.apply(&overrides))
            .map_err(|e| self.fatal(e))?;

        self.init_logging();

        let payload = self.startup_payload();
        self.fire_fatal(HookEvent::BeforeRun, &payload)?;

        let tree = registry.config();
        config::validate(&tree).map_err(|e| self.fatal(e))?;
        let robot: RobotSettings = tree.section_as("robot").map_err(|e| self.fatal(e))?;

        registry.set_locale(&robot.locale);
        registry.set_default_locale(&robot.default_locale);

        self.fire_fatal(HookEvent::ConfigFinalized, &payload)?;
        self.set_state(RobotState::Ready);
        info!(name = %robot.name, adapter = %robot.adapter, "Configuration finalized");
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects storage, builds the adapter and mounts HTTP routes.
    ///
    /// Loads configuration from the default locations first if needed.
    pub async fn start(&self) -> RuntimeResult<()> {
        match self.state() {
            RobotState::Unconfigured => self.load_config(None)?,
            RobotState::Ready => {}
            state => return Err(RuntimeError::invalid_state("start", state)),
        }

        let registry = &self.inner.registry;
        let tree = registry.config();
        let robot: RobotSettings = tree.section_as("robot").map_err(|e| self.fatal(e))?;
        let storage_settings: StorageSettings =
            tree.section_as("storage").map_err(|e| self.fatal(e))?;

        let storage: BoxedStorage = Arc::new(Namespaced::new(
            Arc::clone(&self.inner.storage),
            storage_settings.namespace,
        ));
        storage.ping().await.map_err(|e| self.fatal(e))?;

        let adapter_name = normalize_name(&robot.adapter);
        let factory = registry
            .adapter_factory(&adapter_name)
            .ok_or_else(|| self.fatal(RuntimeError::UnknownAdapter(robot.adapter.clone())))?;

        let identity = robot.identity();
        let adapter_config = tree
            .section_at(&format!("adapters.{adapter_name}"))
            .map(Section::to_value)
            .unwrap_or_else(|| Value::Object(Default::default()));
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(RobotHandle(Arc::downgrade(&self.inner)));
        let adapter = factory(AdapterContext::new(dispatcher, identity.clone(), adapter_config))
            .map_err(|e| self.fatal(e))?;
        let router = Router::new(&identity).map_err(|e| self.fatal(e))?;

        if let Some(http) = &self.inner.http_router {
            for handler in registry.handlers() {
                for route in handler.http_routes() {
                    http.mount(handler.namespace(), route.clone());
                }
            }
        }

        *self.inner.session.write() = Some(Arc::new(Session {
            adapter,
            router,
            identity,
            users: UserStore::new(storage),
            restrictions: Arc::new(RestrictionGuard::new().group("admins", robot.admins)),
        }));
        self.set_state(RobotState::Running);
        self.fire_fatal(HookEvent::Loaded, &HookPayload::Empty)?;
        info!(adapter = %adapter_name, "Robot started");
        Ok(())
    }

    /// Loads configuration, starts, and runs the adapter until it returns or
    /// Ctrl+C is received, then shuts down.
    ///
    /// An adapter error is fatal once shutdown has run.
    pub async fn run(&self, path: Option<&Path>) -> RuntimeResult<()> {
        self.load_config(path)?;
        self.start().await?;
        let session = self.running_session("run")?;

        info!("Robot is running. Press Ctrl+C to stop.");
        let result = tokio::select! {
            result = session.adapter.run() => result,
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                Ok(())
            }
        };

        self.shut_down(&session).await?;
        result.map_err(|e| self.fatal(e))
    }

    /// Signals the adapter to stop. In-flight actions finish.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let session = self.running_session("stop")?;
        self.shut_down(&session).await
    }

    /// Leaves `Running` for `Stopped` if nobody else has.
    fn claim_shutdown(&self) -> bool {
        let mut state = self.inner.state.lock();
        if *state != RobotState::Running {
            return false;
        }
        *state = RobotState::Stopped;
        debug!(from = %RobotState::Running, to = %RobotState::Stopped, "Robot state changed");
        true
    }

    /// Tears the session down once; later callers return immediately.
    async fn shut_down(&self, session: &Session) -> RuntimeResult<()> {
        if !self.claim_shutdown() {
            debug!(state = %self.state(), "Shutdown already claimed");
            return Ok(());
        }
        let registry = &self.inner.registry;
        info!("Shutting down");
        registry
            .fire(&HookEvent::ShutDownStarted, &HookPayload::Empty)
            .map_err(|e| RuntimeError::hook(HookEvent::ShutDownStarted, e))?;

        if let Err(e) = session.adapter.stop().await {
            warn!(adapter = session.adapter.name(), error = %e, "Adapter failed to stop cleanly");
        }

        registry
            .fire(&HookEvent::ShutDownComplete, &HookPayload::Empty)
            .map_err(|e| RuntimeError::hook(HookEvent::ShutDownComplete, e))
    }

    /// Resets the registry and returns to `Unconfigured`. Refused while running.
    pub fn reset(&self) -> RuntimeResult<()> {
        let state = self.state();
        if state == RobotState::Running {
            return Err(RuntimeError::invalid_state("reset", state));
        }
        self.inner.registry.reset();
        *self.inner.session.write() = None;
        *self.inner.config_path.lock() = None;
        self.set_state(RobotState::Unconfigured);
        Ok(())
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Routes `message` and runs every matching action in order.
    ///
    /// Errors and panics from an action are logged and do not stop the
    /// remaining matches. Replies are flushed after each action. Messages
    /// arriving while the robot is not running are dropped.
    pub async fn receive(&self, message: Message) {
        let Ok(session) = self.running_session("receive") else {
            warn!(state = %self.state(), user = %message.user().id, "Message received while the robot is not running");
            return;
        };
        let registry = &self.inner.registry;

        let mut guards = vec![Arc::clone(&session.restrictions)];
        guards.extend(registry.route_guards());
        let handlers = registry.handlers();
        let routed = session.router.route(&handlers, &guards, &message);

        for rejected in &routed.rejected {
            self.notify(HookEvent::RouteAuthorizationFailed, route_payload(&message, rejected));
        }

        if routed.matches.is_empty() {
            debug!(user = %message.user().id, "No route matched");
            self.notify(
                HookEvent::UnhandledMessage,
                HookPayload::Message {
                    message: message.clone(),
                },
            );
            return;
        }

        let tree = registry.config();
        for matched in &routed.matches {
            let namespace = matched.handler().namespace();
            let method = matched.route().method();
            let handler_config = tree
                .section_at(&format!("handlers.{namespace}"))
                .map(Section::to_value)
                .unwrap_or(Value::Null);
            let response = Response::new(
                message.clone(),
                matched,
                Arc::new(handler_config),
                session.users.clone(),
            );

            let outcome = AssertUnwindSafe(matched.route().action().oneshot(response.clone()))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => debug!(handler = namespace, method, "Action completed"),
                Ok(Err(e)) => error!(handler = namespace, method, error = %e, "Action failed"),
                Err(panic) => error!(
                    handler = namespace,
                    method,
                    panic = panic_message(panic.as_ref()),
                    "Action panicked"
                ),
            }

            self.flush(&session, &message, response.take_replies()).await;
            self.notify(HookEvent::MessageDispatched, route_payload(&message, matched));
        }
    }

    async fn flush(&self, session: &Session, message: &Message, replies: Vec<Reply>) {
        for reply in replies {
            let (target, strings) = match reply {
                Reply::Public(strings) => (message.source().clone(), strings),
                Reply::Private(strings) => (message.source().to_private(), strings),
                Reply::Mention(strings) => {
                    let mention = session.adapter.mention_format(message.user().mention_name());
                    let strings = strings
                        .into_iter()
                        .map(|s| format!("{} {s}", mention.trim()))
                        .collect();
                    (message.source().clone(), strings)
                }
            };
            if let Err(e) = session.adapter.send_messages(&target, &strings).await {
                error!(adapter = session.adapter.name(), error = %e, "Failed to send reply");
            }
        }
    }

    /// Fires an observational event; errors are logged, not propagated.
    fn notify(&self, event: HookEvent, payload: HookPayload) {
        if let Err(e) = self.inner.registry.fire(&event, &payload) {
            warn!(%event, error = %e, "Hook failed");
        }
    }

    /// Fires `event` with `payload`, for extension-defined events.
    pub fn trigger(&self, event: impl Into<HookEvent>, payload: HookPayload) -> HookResult<()> {
        self.inner.registry.fire(&event.into(), &payload)
    }

    // =========================================================================
    // Adapter passthrough
    // =========================================================================

    pub async fn send_messages(&self, target: &Source, strings: &[String]) -> RuntimeResult<()> {
        let session = self.running_session("send messages")?;
        Ok(session.adapter.send_messages(target, strings).await?)
    }

    pub async fn join(&self, room: &str) -> RuntimeResult<()> {
        let session = self.running_session("join")?;
        Ok(session.adapter.join(room).await?)
    }

    pub async fn part(&self, room: &str) -> RuntimeResult<()> {
        let session = self.running_session("part")?;
        Ok(session.adapter.part(room).await?)
    }

    pub async fn set_topic(&self, target: &Source, topic: &str) -> RuntimeResult<()> {
        let session = self.running_session("set topic")?;
        Ok(session.adapter.set_topic(target, topic).await?)
    }
}

impl fmt::Debug for Robot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Robot")
            .field("state", &self.state())
            .field("mode", &self.inner.mode)
            .finish_non_exhaustive()
    }
}

fn route_payload(message: &Message, matched: &RouteMatch) -> HookPayload {
    HookPayload::Route {
        message: message.clone(),
        handler: matched.handler().namespace().to_string(),
        method: matched.route().method().to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// The dispatcher handed to adapters. Does not keep the robot alive.
struct RobotHandle(Weak<RobotInner>);

#[async_trait]
impl Dispatcher for RobotHandle {
    async fn dispatch(&self, message: Message) {
        match self.0.upgrade() {
            Some(inner) => Robot { inner }.receive(message).await,
            None => warn!("Message dispatched after the robot was dropped"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
