//! Pewter Framework - handlers, routing and hooks.
//!
//! This crate provides:
//! - Route and handler declaration ([`Route`], [`Handler`])
//! - The per-match reply builder ([`Response`])
//! - Message routing with command-prefix stripping and guards ([`Router`])
//! - Lifecycle hook events, payloads and the hook registry ([`hook`])
//! - HTTP routes a handler can expose ([`http`])
//! - User persistence over the storage capability ([`UserStore`])
//!
//! # Example
//!
//! ```rust,ignore
//! use pewter_framework::{Handler, Response, Route};
//! use tower::BoxError;
//!
//! async fn respond_to_ping(response: Response) -> Result<(), BoxError> {
//!     response.reply("PONG");
//!     Ok(())
//! }
//!
//! let ping = Handler::builder("ping")
//!     .route(Route::new(r"(?i)ping$", "respond_to_ping", respond_to_ping)?.command(true))
//!     .build()?;
//! ```

pub mod error;
pub mod handler;
pub mod hook;
pub mod http;
pub mod response;
pub mod route;
pub mod router;
pub mod users;

pub use error::{HookError, HookResult, RegistrationError, RegistrationResult};
pub use handler::{Handler, HandlerBuilder, normalize_name};
pub use hook::{BoxedHook, CustomEvent, Hook, HookEvent, HookPayload, HookRegistry};
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpRoute, HttpRouter, RouteTable};
pub use response::{MatchData, Reply, Response};
pub use route::{Action, Route, action_fn};
pub use router::{BoxedGuard, CommandPrefix, RestrictionGuard, RouteGuard, RouteMatch, Routed, Router};
pub use users::UserStore;

pub use tower::{BoxError, Layer};
