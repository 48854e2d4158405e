//! HTTP routes declared by handlers.
//!
//! Pewter does not run an HTTP server. At start-up the robot mounts every
//! handler's routes into an [`HttpRouter`] supplied by the embedding
//! application; [`RouteTable`] is a ready-made in-process router a server can
//! delegate to.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::Serialize;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, ServiceExt, service_fn};
use tracing::{debug, error};

use crate::error::{RegistrationError, RegistrationResult};

// ============================================================================
// Method / request / response
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(format!("unknown HTTP method: {other}")),
        }
    }
}

/// A server-agnostic HTTP request.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: String,
}

impl HttpRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// A server-agnostic HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    /// A `200 OK` plain-text response.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }

    /// A `200 OK` JSON response.
    pub fn json<T: Serialize>(body: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            status: 200,
            content_type: "application/json",
            body: serde_json::to_string(body)?,
        })
    }

    /// Replaces the status code.
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn not_found() -> Self {
        Self::text("Not Found").status(404)
    }

    pub fn internal_error() -> Self {
        Self::text("Internal Server Error").status(500)
    }
}

// ============================================================================
// HttpRoute
// ============================================================================

/// The type-erased HTTP action service.
pub type HttpAction = BoxCloneSyncService<HttpRequest, HttpResponse, BoxError>;

/// One method + path binding.
#[derive(Clone)]
pub struct HttpRoute {
    method: HttpMethod,
    path: String,
    action: HttpAction,
}

impl HttpRoute {
    /// Binds `path` to an async function.
    ///
    /// Fails unless `path` starts with `/`.
    pub fn new<F, Fut, E>(method: HttpMethod, path: impl Into<String>, f: F) -> RegistrationResult<Self>
    where
        F: Fn(HttpRequest) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(RegistrationError::InvalidPath(path));
        }
        let action = BoxCloneSyncService::new(service_fn(move |request: HttpRequest| {
            let fut = f(request);
            async move { fut.await.map_err(Into::into) }
        }));
        Ok(Self {
            method,
            path,
            action,
        })
    }

    pub fn get<F, Fut, E>(path: impl Into<String>, f: F) -> RegistrationResult<Self>
    where
        F: Fn(HttpRequest) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(HttpMethod::Get, path, f)
    }

    pub fn post<F, Fut, E>(path: impl Into<String>, f: F) -> RegistrationResult<Self>
    where
        F: Fn(HttpRequest) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(HttpMethod::Post, path, f)
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn action(&self) -> HttpAction {
        self.action.clone()
    }
}

impl fmt::Debug for HttpRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Routers
// ============================================================================

/// The collaborator routes are mounted into.
pub trait HttpRouter: Send + Sync {
    /// Mounts `route`, declared by the handler called `namespace`.
    fn mount(&self, namespace: &str, route: HttpRoute);
}

/// An in-process method + exact-path table.
///
/// Mounting a route whose method and path are already taken replaces it.
#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<HashMap<(HttpMethod, String), HttpRoute>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    /// Serves `request`.
    ///
    /// Unknown routes get a 404; failing actions are logged and get a 500.
    pub async fn call(&self, method: HttpMethod, request: HttpRequest) -> HttpResponse {
        let action = self
            .routes
            .read()
            .get(&(method, request.path.clone()))
            .map(HttpRoute::action);

        let Some(action) = action else {
            return HttpResponse::not_found();
        };

        let path = request.path.clone();
        match action.oneshot(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(%method, %path, error = %e, "HTTP action failed");
                HttpResponse::internal_error()
            }
        }
    }
}

impl HttpRouter for RouteTable {
    fn mount(&self, namespace: &str, route: HttpRoute) {
        debug!(handler = namespace, method = %route.method, path = %route.path, "HTTP route mounted");
        self.routes
            .write()
            .insert((route.method, route.path.clone()), route);
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn ping(_request: HttpRequest) -> Result<HttpResponse, BoxError> {
        Ok(HttpResponse::json(&json!({ "message": "PONG PONG PONG" }))?)
    }

    async fn broken(_request: HttpRequest) -> Result<HttpResponse, BoxError> {
        Err("boom".into())
    }

    #[test]
    fn test_relative_path_is_rejected() {
        assert!(matches!(
            HttpRoute::get("ping", ping),
            Err(RegistrationError::InvalidPath(p)) if p == "ping"
        ));
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("get".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert!("FETCH".parse::<HttpMethod>().is_err());
    }

    #[tokio::test]
    async fn test_route_table_serves_mounted_routes() {
        let table = RouteTable::new();
        table.mount("ping", HttpRoute::get("/ping", ping).unwrap());
        table.mount("ping", HttpRoute::get("/broken", broken).unwrap());
        assert_eq!(table.len(), 2);

        let response = table.call(HttpMethod::Get, HttpRequest::new("/ping")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"message":"PONG PONG PONG"}"#);

        let missing = table.call(HttpMethod::Post, HttpRequest::new("/ping")).await;
        assert_eq!(missing.status, 404);

        let failed = table.call(HttpMethod::Get, HttpRequest::new("/broken")).await;
        assert_eq!(failed.status, 500);
    }
}
