//! Routes: a compiled pattern bound to an async action.
//!
//! Actions are stored as boxed tower services, so any tower [`Layer`] can wrap
//! them:
//!
//! ```rust,ignore
//! let route = Route::new(r"(?i)^ping$", "respond_to_ping", |res: Response| async move {
//!     res.reply("PONG");
//!     Ok::<_, BoxError>(())
//! })?
//! .command(true)
//! .help("ping", "Replies with PONG.");
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use regex::Regex;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Layer, Service, service_fn};

use crate::error::{RegistrationError, RegistrationResult};
use crate::response::Response;

/// The type-erased action service.
pub type Action = BoxCloneSyncService<Response, (), BoxError>;

/// Wraps an async function as an [`Action`].
pub fn action_fn<F, Fut, E>(f: F) -> Action
where
    F: Fn(Response) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    BoxCloneSyncService::new(service_fn(move |response: Response| {
        let fut = f(response);
        async move { fut.await.map_err(Into::into) }
    }))
}

/// A pattern-to-action binding with directedness and metadata.
#[derive(Clone)]
pub struct Route {
    pattern: Regex,
    method: Cow<'static, str>,
    command: bool,
    restrict_to: Vec<String>,
    help: BTreeMap<String, String>,
    action: Action,
}

impl Route {
    /// Compiles `pattern` and binds it to `action`.
    ///
    /// A malformed pattern fails here, before the route can reach a handler.
    pub fn new<F, Fut, E>(
        pattern: &str,
        method: impl Into<Cow<'static, str>>,
        action: F,
    ) -> RegistrationResult<Self>
    where
        F: Fn(Response) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let pattern =
            Regex::new(pattern).map_err(|e| RegistrationError::invalid_pattern(pattern, &e))?;
        Ok(Self::from_regex(pattern, method, action_fn(action)))
    }

    /// Binds an already-compiled pattern to an action service.
    pub fn from_regex(pattern: Regex, method: impl Into<Cow<'static, str>>, action: Action) -> Self {
        Self {
            pattern,
            method: method.into(),
            command: false,
            restrict_to: Vec::new(),
            help: BTreeMap::new(),
            action,
        }
    }

    /// Only match messages directed at the robot.
    pub fn command(mut self, command: bool) -> Self {
        self.command = command;
        self
    }

    /// Restricts the route to members of `group`.
    pub fn restrict_to(mut self, group: impl Into<String>) -> Self {
        self.restrict_to.push(group.into());
        self
    }

    /// Adds a help entry. Purely documentation.
    pub fn help(mut self, usage: impl Into<String>, description: impl Into<String>) -> Self {
        self.help.insert(usage.into(), description.into());
        self
    }

    /// Wraps the action in a tower layer.
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Action>,
        L::Service: Service<Response, Response = (), Error = BoxError> + Clone + Send + Sync + 'static,
        <L::Service as Service<Response>>::Future: Send + 'static,
    {
        self.action = BoxCloneSyncService::new(layer.layer(self.action));
        self
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn is_command(&self) -> bool {
        self.command
    }

    /// Authorization groups; empty means unrestricted.
    pub fn restrictions(&self) -> &[String] {
        &self.restrict_to
    }

    pub fn help_entries(&self) -> &BTreeMap<String, String> {
        &self.help
    }

    /// A fresh handle to the action service.
    pub fn action(&self) -> Action {
        self.action.clone()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.as_str())
            .field("method", &self.method)
            .field("command", &self.command)
            .field("restrict_to", &self.restrict_to)
            .finish_non_exhaustive()
    }
}
