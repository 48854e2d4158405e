//! Lifecycle hooks.
//!
//! Callbacks are registered against a [`HookEvent`] and receive a shared
//! [`HookPayload`]. Firing runs them in registration order on the caller's
//! task and stops at the first error.
//!
//! String event names are normalized at the registration boundary:
//!
//! ```rust,ignore
//! assert_eq!("Before_Run ".parse::<HookEvent>().unwrap(), HookEvent::BeforeRun);
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use pewter_core::Message;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::HookResult;
use crate::handler::normalize_name;

// ============================================================================
// HookEvent
// ============================================================================

/// Points in the robot's lifecycle callbacks can attach to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// After configuration is built, before it is validated.
    BeforeRun,
    /// After configuration has validated.
    ConfigFinalized,
    /// After the adapter is built and the robot is running.
    Loaded,
    ShutDownStarted,
    ShutDownComplete,
    /// After each matched route's action has run.
    MessageDispatched,
    /// When no route matched a message.
    UnhandledMessage,
    /// When a route guard rejected a matching route.
    RouteAuthorizationFailed,
    /// Any other, extension-defined event.
    Custom(CustomEvent),
}

/// The normalized name of an extension-defined event.
///
/// Only built through [`HookEvent::custom`] or string conversion, so two
/// spellings of one name always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomEvent(String);

impl CustomEvent {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl HookEvent {
    /// The event called `name`, after normalization.
    ///
    /// Names of built-in events map onto their variants.
    pub fn custom(name: impl AsRef<str>) -> Self {
        Self::from(name.as_ref())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::BeforeRun => "before_run",
            Self::ConfigFinalized => "config_finalized",
            Self::Loaded => "loaded",
            Self::ShutDownStarted => "shut_down_started",
            Self::ShutDownComplete => "shut_down_complete",
            Self::MessageDispatched => "message_dispatched",
            Self::UnhandledMessage => "unhandled_message",
            Self::RouteAuthorizationFailed => "route_authorization_failed",
            Self::Custom(name) => name.as_str(),
        }
    }
}

impl FromStr for HookEvent {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize_name(s);
        Ok(match name.as_str() {
            "before_run" => Self::BeforeRun,
            "config_finalized" => Self::ConfigFinalized,
            "loaded" => Self::Loaded,
            "shut_down_started" => Self::ShutDownStarted,
            "shut_down_complete" => Self::ShutDownComplete,
            "message_dispatched" => Self::MessageDispatched,
            "unhandled_message" => Self::UnhandledMessage,
            "route_authorization_failed" => Self::RouteAuthorizationFailed,
            _ => Self::Custom(CustomEvent(name)),
        })
    }
}

impl From<&str> for HookEvent {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(event) => event,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// HookPayload
// ============================================================================

/// Data passed to hook callbacks. Built fresh for every fire.
#[derive(Debug, Clone)]
pub enum HookPayload {
    /// Configuration lifecycle (`before_run`, `config_finalized`).
    Startup { config_path: Option<PathBuf> },
    /// A message with no matching route.
    Message { message: Message },
    /// A message and the route it concerns.
    Route {
        message: Message,
        handler: String,
        method: String,
    },
    /// Extension-defined data.
    Custom(Map<String, Value>),
    Empty,
}

impl HookPayload {
    /// The config path of a `Startup` payload.
    pub fn config_path(&self) -> Option<&Path> {
        match self {
            Self::Startup { config_path } => config_path.as_deref(),
            _ => None,
        }
    }

    /// The message of a `Message` or `Route` payload.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Message { message } | Self::Route { message, .. } => Some(message),
            _ => None,
        }
    }
}

// ============================================================================
// Hook
// ============================================================================

/// A lifecycle callback.
///
/// Implemented for every `Fn(&HookPayload) -> HookResult<()>` closure.
pub trait Hook: Send + Sync {
    fn call(&self, payload: &HookPayload) -> HookResult<()>;
}

impl<F> Hook for F
where
    F: Fn(&HookPayload) -> HookResult<()> + Send + Sync,
{
    fn call(&self, payload: &HookPayload) -> HookResult<()> {
        self(payload)
    }
}

/// A shared hook trait object. Identity is the `Arc` allocation.
pub type BoxedHook = Arc<dyn Hook>;

// ============================================================================
// HookRegistry
// ============================================================================

/// Callbacks per event, in registration order, unique by identity.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookEvent, Vec<BoxedHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `hook` to `event`.
    ///
    /// Returns `false`, leaving the registry unchanged, when this very hook is
    /// already registered for the event.
    pub fn register(&mut self, event: HookEvent, hook: BoxedHook) -> bool {
        let hooks = self.hooks.entry(event).or_default();
        if hooks
            .iter()
            .any(|h| std::ptr::addr_eq(Arc::as_ptr(h), Arc::as_ptr(&hook)))
        {
            return false;
        }
        hooks.push(hook);
        true
    }

    /// Callbacks for `event`, cloned so they can run without holding a lock.
    pub fn snapshot(&self, event: &HookEvent) -> Vec<BoxedHook> {
        self.hooks.get(event).cloned().unwrap_or_default()
    }

    /// Number of callbacks registered for `event`.
    pub fn count(&self, event: &HookEvent) -> usize {
        self.hooks.get(event).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.hooks.clear();
    }

    /// Fires `event` against this registry directly.
    pub fn fire(&self, event: &HookEvent, payload: &HookPayload) -> HookResult<()> {
        fire(event, &self.snapshot(event), payload)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> =
            self.hooks.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}

/// Runs `hooks` in order, stopping at the first error.
pub fn fire(event: &HookEvent, hooks: &[BoxedHook], payload: &HookPayload) -> HookResult<()> {
    trace!(%event, count = hooks.len(), "Firing hooks");
    for hook in hooks {
        if let Err(e) = hook.call(payload) {
            trace!(%event, "Hook failed, skipping remaining callbacks");
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::error::HookError;

    #[test]
    fn test_event_names_are_normalized() {
        assert_eq!(HookEvent::from("Before_Run "), HookEvent::BeforeRun);
        assert_eq!(HookEvent::from("foO").as_str(), "foo");
        assert!(matches!(HookEvent::from("foO"), HookEvent::Custom(_)));
        assert_eq!(HookEvent::from("Foo "), HookEvent::from("foo"));
        assert_eq!(HookEvent::ConfigFinalized.to_string(), "config_finalized");
    }

    #[test]
    fn test_custom_events_are_normalized_on_construction() {
        assert_eq!(HookEvent::custom("Foo "), HookEvent::from("foo"));
        assert_eq!(HookEvent::custom("Foo ").to_string(), "foo");
        assert_eq!(HookEvent::custom(" LOADED"), HookEvent::Loaded);
    }

    #[test]
    fn test_same_hook_registers_once() {
        let mut registry = HookRegistry::new();
        let hook: BoxedHook = Arc::new(|_: &HookPayload| -> HookResult<()> { Ok(()) });

        assert!(registry.register(HookEvent::from("Foo "), hook.clone()));
        assert!(!registry.register(HookEvent::from("foo"), hook.clone()));
        assert_eq!(registry.count(&HookEvent::from("foo")), 1);

        let other: BoxedHook = Arc::new(|_: &HookPayload| -> HookResult<()> { Ok(()) });
        assert!(registry.register(HookEvent::from("foo"), other));
        assert_eq!(registry.count(&HookEvent::from("foo")), 2);
    }

    #[test]
    fn test_fire_in_order_and_stop_at_first_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();

        for (i, fail) in [(1, false), (2, true), (3, false)] {
            let calls = calls.clone();
            registry.register(
                HookEvent::Loaded,
                Arc::new(move |_: &HookPayload| {
                    calls.lock().push(i);
                    if fail {
                        Err(HookError::new("nope"))
                    } else {
                        Ok(())
                    }
                }),
            );
        }

        let err = registry
            .fire(&HookEvent::Loaded, &HookPayload::Empty)
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(*calls.lock(), vec![1, 2]);
    }

    #[test]
    fn test_payload_is_shared_with_every_callback() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        for _ in 0..2 {
            let seen = seen.clone();
            registry.register(
                HookEvent::BeforeRun,
                Arc::new(move |payload: &HookPayload| -> HookResult<()> {
                    if payload.config_path() == Some(Path::new("pewter.toml")) {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(())
                }),
            );
        }

        let payload = HookPayload::Startup {
            config_path: Some(PathBuf::from("pewter.toml")),
        };
        registry.fire(&HookEvent::BeforeRun, &payload).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fire_without_hooks_is_ok() {
        let registry = HookRegistry::new();
        assert!(registry.is_empty());
        registry
            .fire(&HookEvent::custom("nothing"), &HookPayload::Empty)
            .unwrap();
    }
}
