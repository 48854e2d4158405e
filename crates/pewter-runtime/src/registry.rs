//! The registry: adapters, handlers, hooks, route guards and configuration.
//!
//! A [`Registry`] is an explicit value shared behind an `Arc`. Everything it
//! holds sits behind one coarse mutex; callbacks (hooks, locale backend) are
//! cloned out and invoked after the lock is released, so they may call back
//! into the registry.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use pewter_core::{
    AdapterContext, AdapterFactory, AdapterResult, BoxedAdapter, ConfigTree, ConfigurableAdapter,
    Section, StubAdapter,
};
use pewter_framework::{
    BoxedGuard, BoxedHook, Handler, HandlerBuilder, HookEvent, HookPayload, HookRegistry,
    HookResult, RegistrationError, RegistrationResult, hook, normalize_name,
};
use tracing::{debug, warn};

use crate::config::default_tree;
use crate::locale::{LocaleBackend, LocalePaths, NoopLocaleBackend, normalize_locale};

struct AdapterEntry {
    factory: AdapterFactory,
    config: Section,
}

#[derive(Default)]
struct Inner {
    adapters: HashMap<String, AdapterEntry>,
    handlers: Vec<Arc<Handler>>,
    hooks: HookRegistry,
    guards: Vec<BoxedGuard>,
    config: Option<Arc<ConfigTree>>,
    locale_paths: Vec<PathBuf>,
    locale: Option<String>,
    default_locale: Option<String>,
}

/// Registry for everything a robot is assembled from.
pub struct Registry {
    inner: Mutex<Inner>,
    locale_backend: Arc<dyn LocaleBackend>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::with_locale_backend(Arc::new(NoopLocaleBackend))
    }

    /// Creates an empty registry that forwards locale changes to `backend`.
    pub fn with_locale_backend(backend: Arc<dyn LocaleBackend>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            locale_backend: backend,
        }
    }

    // =========================================================================
    // Adapters
    // =========================================================================

    /// Registers an adapter factory under `name`, with no config section of its own.
    pub fn register_adapter(
        &self,
        name: impl AsRef<str>,
        factory: AdapterFactory,
    ) -> RegistrationResult<()> {
        self.register_adapter_with_config(name, factory, |section| section)
    }

    /// Registers an adapter factory and declares its `adapters.<name>` section.
    ///
    /// The name is trimmed and lower-cased; registering the same normalized
    /// name again replaces the earlier adapter.
    pub fn register_adapter_with_config<F>(
        &self,
        name: impl AsRef<str>,
        factory: AdapterFactory,
        config: F,
    ) -> RegistrationResult<()>
    where
        F: FnOnce(Section) -> Section,
    {
        let name = normalize_name(name.as_ref());
        if name.is_empty() {
            return Err(RegistrationError::blank_name("adapter"));
        }
        let section = config(Section::new(name.clone()));

        let mut inner = self.inner.lock();
        if let Some(tree) = inner.config.as_mut()
            && let Err(e) = Arc::make_mut(tree).graft("adapters", section.clone())
        {
            warn!(adapter = %name, error = %e, "Could not add adapter config section");
        }
        let replaced = inner
            .adapters
            .insert(name.clone(), AdapterEntry { factory, config: section })
            .is_some();
        debug!(adapter = %name, replaced, "Registered adapter");
        Ok(())
    }

    /// Registers an adapter type under [`ConfigurableAdapter::NAME`].
    pub fn register_adapter_type<A: ConfigurableAdapter>(&self) -> RegistrationResult<()> {
        self.register_adapter_with_config(A::NAME, A::factory(), A::config)
    }

    /// Registers an adapter whose operations only log that they are not implemented.
    pub fn register_adapter_stub(&self, name: impl AsRef<str>) -> RegistrationResult<()> {
        let stub_name = normalize_name(name.as_ref());
        let factory: AdapterFactory =
            Arc::new(move |_ctx: AdapterContext| -> AdapterResult<BoxedAdapter> {
                Ok(Arc::new(StubAdapter::new(stub_name.clone())))
            });
        self.register_adapter(name, factory)
    }

    /// The factory registered under `name`, after normalization.
    pub fn adapter_factory(&self, name: &str) -> Option<AdapterFactory> {
        let name = normalize_name(name);
        self.inner
            .lock()
            .adapters
            .get(&name)
            .map(|entry| Arc::clone(&entry.factory))
    }

    /// Registered adapter names, sorted.
    pub fn adapter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().adapters.keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Registers a handler.
    ///
    /// Returns `false` when this very handler (same `Arc`) is already registered.
    pub fn register_handler(&self, handler: impl Into<Arc<Handler>>) -> bool {
        let handler = handler.into();
        let mut inner = self.inner.lock();
        if inner.handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return false;
        }
        if let Some(section) = handler.config().cloned()
            && let Some(tree) = inner.config.as_mut()
            && let Err(e) = Arc::make_mut(tree).graft("handlers", section)
        {
            warn!(handler = handler.namespace(), error = %e, "Could not add handler config section");
        }
        debug!(handler = handler.namespace(), routes = handler.routes().len(), "Registered handler");
        inner.handlers.push(handler);
        true
    }

    /// Builds a handler named `name` with `build` and registers it.
    ///
    /// Fails when `name` is blank.
    pub fn register_handler_with<F>(&self, name: impl AsRef<str>, build: F) -> RegistrationResult<Arc<Handler>>
    where
        F: FnOnce(HandlerBuilder) -> HandlerBuilder,
    {
        let handler = Arc::new(build(Handler::builder(name)).build()?);
        self.register_handler(Arc::clone(&handler));
        Ok(handler)
    }

    /// Registered handlers in registration order.
    pub fn handlers(&self) -> Vec<Arc<Handler>> {
        self.inner.lock().handlers.clone()
    }

    // =========================================================================
    // Hooks and route guards
    // =========================================================================

    /// Registers `hook` for `event`. String names are trimmed and lower-cased.
    ///
    /// Returns `false` when this very hook is already registered for the event.
    pub fn register_hook(&self, event: impl Into<HookEvent>, hook: BoxedHook) -> bool {
        let event = event.into();
        let added = self.inner.lock().hooks.register(event.clone(), hook);
        debug!(%event, added, "Registered hook");
        added
    }

    /// Number of hooks registered for `event`.
    pub fn hook_count(&self, event: impl Into<HookEvent>) -> usize {
        self.inner.lock().hooks.count(&event.into())
    }

    /// Runs the hooks for `event` in registration order, stopping at the first error.
    pub fn fire(&self, event: &HookEvent, payload: &HookPayload) -> HookResult<()> {
        let hooks = self.inner.lock().hooks.snapshot(event);
        hook::fire(event, &hooks, payload)
    }

    /// Adds a guard consulted for every matching route, after the robot's own.
    pub fn register_route_guard(&self, guard: BoxedGuard) {
        self.inner.lock().guards.push(guard);
    }

    pub fn route_guards(&self) -> Vec<BoxedGuard> {
        self.inner.lock().guards.clone()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// The configuration tree.
    ///
    /// Built on first use from the defaults plus every registered adapter and
    /// handler section, then memoized until [`Registry::reset`].
    pub fn config(&self) -> Arc<ConfigTree> {
        let mut inner = self.inner.lock();
        Arc::clone(Self::ensure_config(&mut inner))
    }

    /// Mutates the memoized tree in place.
    ///
    /// `f` runs under the registry lock and must not call back into the registry.
    pub fn configure<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ConfigTree) -> R,
    {
        let mut inner = self.inner.lock();
        f(Arc::make_mut(Self::ensure_config(&mut inner)))
    }

    fn ensure_config(inner: &mut Inner) -> &mut Arc<ConfigTree> {
        let Inner {
            config,
            adapters,
            handlers,
            ..
        } = inner;
        config.get_or_insert_with(|| Arc::new(build_config(adapters, handlers)))
    }

    // =========================================================================
    // Locales
    // =========================================================================

    /// Appends one or more locale paths and reloads the backend.
    pub fn load_locales(&self, paths: impl Into<LocalePaths>) {
        let snapshot = {
            let mut inner = self.inner.lock();
            inner.locale_paths.extend(paths.into().0);
            inner.locale_paths.clone()
        };
        debug!(paths = snapshot.len(), "Reloading locales");
        self.locale_backend.reload(&snapshot);
    }

    pub fn locale_paths(&self) -> Vec<PathBuf> {
        self.inner.lock().locale_paths.clone()
    }

    /// Selects the active locale. `_` is normalized to `-`.
    pub fn set_locale(&self, locale: &str) {
        let locale = normalize_locale(locale);
        self.inner.lock().locale = Some(locale.clone());
        self.locale_backend.set_locale(&locale);
    }

    /// Selects the fallback locale. `_` is normalized to `-`.
    pub fn set_default_locale(&self, locale: &str) {
        let locale = normalize_locale(locale);
        self.inner.lock().default_locale = Some(locale.clone());
        self.locale_backend.set_default_locale(&locale);
    }

    pub fn locale(&self) -> Option<String> {
        self.inner.lock().locale.clone()
    }

    pub fn default_locale(&self) -> Option<String> {
        self.inner.lock().default_locale.clone()
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Drops adapters, handlers, hooks, route guards and the memoized configuration.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.adapters.clear();
        inner.handlers.clear();
        inner.hooks.clear();
        inner.guards.clear();
        inner.config = None;
        debug!("Registry reset");
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Registry")
            .field("adapters", &inner.adapters.keys().collect::<Vec<_>>())
            .field("handlers", &inner.handlers.len())
            .field("hooks", &inner.hooks)
            .field("guards", &inner.guards.len())
            .field("configured", &inner.config.is_some())
            .finish()
    }
}

fn build_config(adapters: &HashMap<String, AdapterEntry>, handlers: &[Arc<Handler>]) -> ConfigTree {
    let mut tree = default_tree();

    let mut names: Vec<&String> = adapters.keys().collect();
    names.sort();
    for name in names {
        if let Err(e) = tree.graft("adapters", adapters[name].config.clone()) {
            warn!(adapter = %name, error = %e, "Could not add adapter config section");
        }
    }

    for handler in handlers {
        if let Some(section) = handler.config()
            && let Err(e) = tree.graft("handlers", section.clone())
        {
            warn!(handler = handler.namespace(), error = %e, "Could not add handler config section");
        }
    }
    tree
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pewter_core::{Attribute, ValueKind};
    use pewter_framework::{BoxError, HookError, Response, Route};
    use serde_json::json;

    use super::*;

    fn stub_factory(label: &'static str) -> AdapterFactory {
        Arc::new(move |_ctx: AdapterContext| -> AdapterResult<BoxedAdapter> {
            Ok(Arc::new(StubAdapter::new(label)))
        })
    }

    async fn noop(_response: Response) -> Result<(), BoxError> {
        Ok(())
    }

    #[test]
    fn test_adapter_name_normalization_overwrites() {
        let registry = Registry::new();
        registry.register_adapter("Foo ", stub_factory("first")).unwrap();
        registry.register_adapter("foo", stub_factory("second")).unwrap();

        assert_eq!(registry.adapter_names(), vec!["foo".to_string()]);
        assert!(registry.adapter_factory("FOO").is_some());
    }

    #[test]
    fn test_blank_adapter_name_is_rejected_without_mutation() {
        let registry = Registry::new();
        registry.register_adapter("shell", stub_factory("shell")).unwrap();

        let err = registry.register_adapter("   ", stub_factory("blank")).unwrap_err();
        assert!(matches!(err, RegistrationError::BlankName { kind: "adapter" }));
        assert_eq!(registry.adapter_names(), vec!["shell".to_string()]);
    }

    #[test]
    fn test_adapter_config_section_is_grafted() {
        let registry = Registry::new();
        registry
            .register_adapter_with_config("irc", stub_factory("irc"), |s| {
                s.attribute(Attribute::new("server").kind(ValueKind::String).default("irc.libera.chat"))
            })
            .unwrap();

        let config = registry.config();
        assert_eq!(config.get_str("adapters.irc.server"), Some("irc.libera.chat"));
    }

    #[test]
    fn test_handler_registration_is_identity_idempotent() {
        let registry = Registry::new();
        let handler = Arc::new(Handler::builder("Echo").build().unwrap());

        assert!(registry.register_handler(Arc::clone(&handler)));
        assert!(!registry.register_handler(Arc::clone(&handler)));
        assert_eq!(registry.handlers().len(), 1);
        assert_eq!(registry.handlers()[0].namespace(), "echo");
    }

    #[test]
    fn test_register_handler_with_block() {
        let registry = Registry::new();
        let handler = registry
            .register_handler_with(" Weather ", |h| {
                h.route(Route::new(r"^weather$", "forecast", noop).unwrap())
                    .config(|s| s.attribute(Attribute::new("units").default("metric")))
            })
            .unwrap();

        assert_eq!(handler.namespace(), "weather");
        assert_eq!(registry.config().get_str("handlers.weather.units"), Some("metric"));

        let err = registry.register_handler_with("  ", |h| h).unwrap_err();
        assert!(matches!(err, RegistrationError::BlankName { kind: "handler" }));
        assert_eq!(registry.handlers().len(), 1);
    }

    #[test]
    fn test_hook_registration_normalizes_and_dedupes() {
        let registry = Registry::new();
        let hook: BoxedHook = Arc::new(|_: &HookPayload| -> HookResult<()> { Ok(()) });

        assert!(registry.register_hook("Foo ", Arc::clone(&hook)));
        assert!(!registry.register_hook("foo", Arc::clone(&hook)));
        assert_eq!(registry.hook_count("FOO"), 1);
    }

    #[test]
    fn test_fire_runs_hooks_in_order() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first_calls = Arc::clone(&calls);
        registry.register_hook(
            HookEvent::Loaded,
            Arc::new(move |_: &HookPayload| -> HookResult<()> {
                assert_eq!(first_calls.fetch_add(1, Ordering::SeqCst), 0);
                Ok(())
            }),
        );
        let second_calls = Arc::clone(&calls);
        registry.register_hook(
            HookEvent::Loaded,
            Arc::new(move |_: &HookPayload| -> HookResult<()> {
                assert_eq!(second_calls.fetch_add(1, Ordering::SeqCst), 1);
                Ok(())
            }),
        );

        registry.fire(&HookEvent::Loaded, &HookPayload::Empty).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hook_may_call_back_into_registry() {
        let registry = Arc::new(Registry::new());
        let inner = Arc::clone(&registry);
        registry.register_hook(
            "custom",
            Arc::new(move |_: &HookPayload| -> HookResult<()> {
                inner
                    .register_adapter_stub("late")
                    .map_err(|e| HookError::new(e.to_string()))
            }),
        );

        registry.fire(&"custom".into(), &HookPayload::Empty).unwrap();
        assert_eq!(registry.adapter_names(), vec!["late".to_string()]);
    }

    #[test]
    fn test_config_is_memoized() {
        let registry = Registry::new();
        registry.configure(|tree| tree.set("robot.name", "Marvin")).unwrap();
        assert_eq!(registry.config().get_str("robot.name"), Some("Marvin"));

        registry.register_adapter_stub("irc").unwrap();
        let config = registry.config();
        assert_eq!(config.get_str("robot.name"), Some("Marvin"));
        assert!(config.section_at("adapters.irc").is_some());
    }

    #[test]
    fn test_config_round_trip() {
        let registry = Registry::new();
        registry
            .configure(|tree| tree.apply(&json!({ "robot": { "name": "Marvin", "admins": ["1"] } })))
            .unwrap();

        let value = registry.config().to_value();
        assert_eq!(value["robot"]["name"], json!("Marvin"));
        assert_eq!(value["robot"]["admins"], json!(["1"]));
        assert_eq!(value["http"]["port"], json!(8080));
    }

    #[test]
    fn test_reset_clears_everything() {
        let registry = Registry::new();
        registry.register_adapter_stub("shell").unwrap();
        registry.register_handler_with("echo", |h| h).unwrap();
        registry.register_hook("loaded", Arc::new(|_: &HookPayload| -> HookResult<()> { Ok(()) }));
        registry.register_route_guard(Arc::new(|_: &Route, _: &pewter_core::Message| true));
        registry.configure(|tree| tree.set("robot.name", "Marvin")).unwrap();

        registry.reset();

        assert!(registry.adapter_names().is_empty());
        assert!(registry.handlers().is_empty());
        assert_eq!(registry.hook_count("loaded"), 0);
        assert!(registry.route_guards().is_empty());
        assert_eq!(registry.config().get_str("robot.name"), Some("Pewter"));
    }

    #[derive(Default)]
    struct RecordingBackend {
        reloads: Mutex<Vec<usize>>,
        locales: Mutex<Vec<String>>,
    }

    impl LocaleBackend for RecordingBackend {
        fn reload(&self, paths: &[PathBuf]) {
            self.reloads.lock().push(paths.len());
        }

        fn set_locale(&self, locale: &str) {
            self.locales.lock().push(locale.to_string());
        }

        fn set_default_locale(&self, locale: &str) {
            self.locales.lock().push(format!("default:{locale}"));
        }
    }

    #[test]
    fn test_locales_are_forwarded() {
        let backend = Arc::new(RecordingBackend::default());
        let registry = Registry::with_locale_backend(backend.clone());

        registry.load_locales("locales");
        registry.load_locales(vec!["a", "b"]);
        registry.set_locale("es_MX.UTF-8");
        registry.set_default_locale("en_US");

        assert_eq!(*backend.reloads.lock(), vec![1, 3]);
        assert_eq!(
            *backend.locales.lock(),
            vec!["es-MX.UTF-8".to_string(), "default:en-US".to_string()]
        );
        assert_eq!(registry.locale().as_deref(), Some("es-MX.UTF-8"));
    }
}
