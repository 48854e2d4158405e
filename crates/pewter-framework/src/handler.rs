//! Handlers: named bundles of chat routes, HTTP routes and a config section.
//!
//! ```rust,ignore
//! let handler = Handler::builder("Weather")
//!     .config(|s| s.attribute(Attribute::new("api_key").kind(ValueKind::String).required()))
//!     .route(Route::new(r"(?i)^weather\s+(.+)$", "forecast", forecast)?.command(true))
//!     .build()?;
//!
//! assert_eq!(handler.namespace(), "weather");
//! ```

use pewter_core::Section;

use crate::error::{RegistrationError, RegistrationResult};
use crate::http::HttpRoute;
use crate::route::Route;

/// Trims and lower-cases a registration name.
///
/// `"Foo "`, `"foo"` and `"FOO"` all normalize to `"foo"`.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A set of routes under one namespace.
///
/// Handlers are immutable once built. Register them behind an `Arc`; the
/// registry treats two `Arc`s to the same handler as one.
#[derive(Debug, Clone)]
pub struct Handler {
    namespace: String,
    routes: Vec<Route>,
    http_routes: Vec<HttpRoute>,
    config: Option<Section>,
}

impl Handler {
    /// Starts building a handler. `name` is normalized.
    pub fn builder(name: impl AsRef<str>) -> HandlerBuilder {
        HandlerBuilder {
            namespace: normalize_name(name.as_ref()),
            routes: Vec::new(),
            http_routes: Vec::new(),
            config: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Routes in declaration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn http_routes(&self) -> &[HttpRoute] {
        &self.http_routes
    }

    /// The `handlers.<namespace>` config section, if declared.
    pub fn config(&self) -> Option<&Section> {
        self.config.as_ref()
    }
}

/// Builder for [`Handler`].
#[derive(Debug)]
pub struct HandlerBuilder {
    namespace: String,
    routes: Vec<Route>,
    http_routes: Vec<HttpRoute>,
    config: Option<Section>,
}

impl HandlerBuilder {
    /// Adds a chat route.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds an HTTP route.
    pub fn http(mut self, route: HttpRoute) -> Self {
        self.http_routes.push(route);
        self
    }

    /// Declares the handler's config section.
    pub fn config<F>(mut self, build: F) -> Self
    where
        F: FnOnce(Section) -> Section,
    {
        self.config = Some(build(Section::new(self.namespace.clone())));
        self
    }

    /// Finishes the handler.
    ///
    /// Fails when the namespace is blank.
    pub fn build(self) -> RegistrationResult<Handler> {
        if self.namespace.is_empty() {
            return Err(RegistrationError::blank_name("handler"));
        }
        Ok(Handler {
            namespace: self.namespace,
            routes: self.routes,
            http_routes: self.http_routes,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use pewter_core::{Attribute, ValueKind};
    use tower::BoxError;

    use super::*;
    use crate::response::Response;

    async fn noop(_response: Response) -> Result<(), BoxError> {
        Ok(())
    }

    #[test]
    fn test_namespace_is_normalized() {
        let handler = Handler::builder("  Weather ").build().unwrap();
        assert_eq!(handler.namespace(), "weather");
        assert_eq!(normalize_name("foO "), "foo");
    }

    #[test]
    fn test_blank_name_is_rejected() {
        assert!(matches!(
            Handler::builder("   ").build(),
            Err(RegistrationError::BlankName { kind: "handler" })
        ));
    }

    #[test]
    fn test_routes_keep_declaration_order() {
        let handler = Handler::builder("echo")
            .route(Route::new("a", "first", noop).unwrap())
            .route(Route::new("b", "second", noop).unwrap())
            .config(|s| s.attribute(Attribute::new("prefix").kind(ValueKind::String)))
            .build()
            .unwrap();

        let methods: Vec<&str> = handler.routes().iter().map(Route::method).collect();
        assert_eq!(methods, ["first", "second"]);
        assert_eq!(handler.config().unwrap().name(), "echo");
    }
}
