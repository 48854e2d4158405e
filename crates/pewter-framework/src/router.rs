//! Message routing.
//!
//! The [`Router`] is a pure query over the live handler set: given a message it
//! returns every route whose pattern matches, in handler registration order and
//! then route declaration order. There is no first-match-wins; every match is
//! invoked once.
//!
//! Command routes only see directed messages, and they match against the text
//! with any leading mention of the robot removed:
//!
//! ```text
//! "Pewter: remember this blue"  ──strip──▶  "remember this blue"
//! "@pewter, ping"               ──strip──▶  "ping"
//! "!ping"            (alias "!") ──strip──▶  "ping"
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use pewter_core::{Message, RobotIdentity, User};
use regex::{Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::error::{RegistrationError, RegistrationResult};
use crate::handler::Handler;
use crate::response::MatchData;
use crate::route::Route;

// ============================================================================
// CommandPrefix
// ============================================================================

/// Recognizes a leading mention of the robot.
#[derive(Debug, Clone)]
pub struct CommandPrefix {
    mention: Regex,
    alias: Option<Regex>,
}

impl CommandPrefix {
    /// Compiles the prefix patterns for `identity`.
    pub fn new(identity: &RobotIdentity) -> RegistrationResult<Self> {
        let mut names = vec![regex::escape(&identity.mention_name)];
        if identity.name != identity.mention_name {
            names.push(regex::escape(&identity.name));
        }
        let source = format!(r"^\s*@?(?:{})[:,]?\s+", names.join("|"));
        let mention = compile(&source)?;

        let alias = match identity.alias.as_deref().map(str::trim) {
            Some(alias) if !alias.is_empty() => {
                Some(compile(&format!(r"^\s*{}\s*", regex::escape(alias)))?)
            }
            _ => None,
        };

        Ok(Self { mention, alias })
    }

    /// `text` with the leading mention removed, or `None` if there is none.
    pub fn strip<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.alias
            .iter()
            .chain(std::iter::once(&self.mention))
            .find_map(|re| re.find(text).map(|m| &text[m.end()..]))
    }

    /// Returns `true` if `text` starts with a mention of the robot.
    pub fn matches(&self, text: &str) -> bool {
        self.strip(text).is_some()
    }
}

fn compile(source: &str) -> RegistrationResult<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|e| RegistrationError::invalid_pattern(source, &e))
}

// ============================================================================
// Guards
// ============================================================================

/// Decides whether a matching route may run for a message.
///
/// Guards run in registration order after the pattern has matched; the first
/// rejection drops the route and skips the remaining guards.
pub trait RouteGuard: Send + Sync {
    fn allow(&self, route: &Route, message: &Message) -> bool;
}

impl<F> RouteGuard for F
where
    F: Fn(&Route, &Message) -> bool + Send + Sync,
{
    fn allow(&self, route: &Route, message: &Message) -> bool {
        self(route, message)
    }
}

/// A shared guard trait object.
pub type BoxedGuard = Arc<dyn RouteGuard>;

/// Allows restricted routes only for members of one of their groups.
///
/// Unrestricted routes always pass.
#[derive(Debug, Clone, Default)]
pub struct RestrictionGuard {
    groups: HashMap<String, HashSet<String>>,
}

impl RestrictionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds user ids to `group`.
    pub fn group<I, S>(mut self, group: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .entry(group.into())
            .or_default()
            .extend(members.into_iter().map(Into::into));
        self
    }

    pub fn is_member(&self, user: &User, group: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(&user.id))
    }
}

impl RouteGuard for RestrictionGuard {
    fn allow(&self, route: &Route, message: &Message) -> bool {
        let groups = route.restrictions();
        groups.is_empty() || groups.iter().any(|g| self.is_member(message.user(), g))
    }
}

// ============================================================================
// Router
// ============================================================================

/// One route that matched a message.
#[derive(Clone)]
pub struct RouteMatch {
    handler: Arc<Handler>,
    index: usize,
    text: String,
    captures: MatchData,
}

impl RouteMatch {
    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    pub fn route(&self) -> &Route {
        &self.handler.routes()[self.index]
    }

    /// The text the pattern matched against.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn captures(&self) -> &MatchData {
        &self.captures
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("handler", &self.handler.namespace())
            .field("method", &self.route().method())
            .field("text", &self.text)
            .finish()
    }
}

/// The outcome of routing one message.
#[derive(Debug, Default)]
pub struct Routed {
    /// Routes to invoke, in order.
    pub matches: Vec<RouteMatch>,
    /// Routes whose pattern matched but a guard rejected.
    pub rejected: Vec<RouteMatch>,
}

/// Matches messages against the routes of registered handlers.
#[derive(Debug, Clone)]
pub struct Router {
    prefix: CommandPrefix,
}

impl Router {
    pub fn new(identity: &RobotIdentity) -> RegistrationResult<Self> {
        Ok(Self {
            prefix: CommandPrefix::new(identity)?,
        })
    }

    pub fn prefix(&self) -> &CommandPrefix {
        &self.prefix
    }

    /// Routes `message` through `handlers`, consulting `guards` for every match.
    pub fn route(
        &self,
        handlers: &[Arc<Handler>],
        guards: &[BoxedGuard],
        message: &Message,
    ) -> Routed {
        let directed = message.is_directed();
        let body = message.body();
        let command_text = if directed {
            self.prefix.strip(body).unwrap_or(body)
        } else {
            body
        };

        let mut routed = Routed::default();
        for handler in handlers {
            for (index, route) in handler.routes().iter().enumerate() {
                if route.is_command() && !directed {
                    continue;
                }
                let text = if route.is_command() { command_text } else { body };

                let Some(captures) = route.pattern().captures(text) else {
                    continue;
                };
                let matched = RouteMatch {
                    handler: Arc::clone(handler),
                    index,
                    text: text.to_string(),
                    captures: MatchData::new(route.pattern(), &captures),
                };

                if guards.iter().all(|guard| guard.allow(route, message)) {
                    trace!(handler = handler.namespace(), method = route.method(), "Route matched");
                    routed.matches.push(matched);
                } else {
                    debug!(
                        handler = handler.namespace(),
                        method = route.method(),
                        user = %message.user().id,
                        "Route rejected by guard"
                    );
                    routed.rejected.push(matched);
                }
            }
        }
        routed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pewter_core::Source;
    use tower::BoxError;

    use super::*;
    use crate::response::Response;

    async fn noop(_response: Response) -> Result<(), BoxError> {
        Ok(())
    }

    fn route(pattern: &str, method: &'static str) -> Route {
        Route::new(pattern, method, noop).unwrap()
    }

    fn router() -> Router {
        Router::new(&RobotIdentity::new("Pewter").mention_name("pewter_bot").alias("!")).unwrap()
    }

    fn message(body: &str) -> Message {
        Message::new(body, Source::new(User::new("1", "Carl")).room("#lobby"))
    }

    fn methods(routed: &Routed) -> Vec<&str> {
        routed.matches.iter().map(|m| m.route().method()).collect()
    }

    #[test]
    fn test_prefix_strip_variants() {
        let prefix = router().prefix;
        assert_eq!(prefix.strip("Pewter: ping"), Some("ping"));
        assert_eq!(prefix.strip("@pewter_bot, ping"), Some("ping"));
        assert_eq!(prefix.strip("  PEWTER ping"), Some("ping"));
        assert_eq!(prefix.strip("!ping"), Some("ping"));
        assert_eq!(prefix.strip("Pewterish ping"), None);
        assert_eq!(prefix.strip("ping Pewter"), None);
    }

    #[test]
    fn test_prefix_escapes_names() {
        let prefix = CommandPrefix::new(&RobotIdentity::new("R2.D2")).unwrap();
        assert!(prefix.matches("r2.d2: hello"));
        assert!(!prefix.matches("r2xd2: hello"));
    }

    #[test]
    fn test_directed_command_is_stripped_before_matching() {
        let handler = Arc::new(
            Handler::builder("ping")
                .route(route("^ping$", "respond_to_ping").command(true))
                .build()
                .unwrap(),
        );

        let directed = router().route(&[handler.clone()], &[], &message("@pewter_bot ping").directed());
        assert_eq!(methods(&directed), ["respond_to_ping"]);
        assert_eq!(directed.matches[0].text(), "ping");

        let undirected = router().route(&[handler], &[], &message("@pewter_bot ping"));
        assert!(undirected.matches.is_empty());
    }

    #[test]
    fn test_private_message_is_directed_without_prefix() {
        let handler = Arc::new(
            Handler::builder("ping")
                .route(route("^ping$", "respond_to_ping").command(true))
                .build()
                .unwrap(),
        );
        let private = Message::new("ping", Source::new(User::new("1", "Carl")).private_message());
        assert_eq!(methods(&router().route(&[handler], &[], &private)), ["respond_to_ping"]);
    }

    #[test]
    fn test_overheard_routes_match_raw_text_regardless_of_direction() {
        let handler = Arc::new(
            Handler::builder("karma")
                .route(route(r"(\w+)\+\+", "increment"))
                .build()
                .unwrap(),
        );

        let heard = router().route(&[handler.clone()], &[], &message("rust++ is great"));
        assert_eq!(methods(&heard), ["increment"]);
        assert_eq!(heard.matches[0].captures().get(1), Some("rust"));

        let directed = router().route(&[handler], &[], &message("Pewter: rust++").directed());
        assert_eq!(directed.matches[0].text(), "Pewter: rust++");
    }

    #[test]
    fn test_all_matches_in_registration_then_declaration_order() {
        let first = Arc::new(
            Handler::builder("first")
                .route(route("hello", "a"))
                .route(route("nope", "b"))
                .route(route("(?i)HELLO", "c"))
                .build()
                .unwrap(),
        );
        let second = Arc::new(
            Handler::builder("second")
                .route(route("hell", "d"))
                .build()
                .unwrap(),
        );

        let routed = router().route(&[first, second], &[], &message("hello"));
        assert_eq!(methods(&routed), ["a", "c", "d"]);
    }

    #[test]
    fn test_no_handlers_no_matches() {
        let routed = router().route(&[], &[], &message("hello").directed());
        assert!(routed.matches.is_empty());
        assert!(routed.rejected.is_empty());
    }

    #[test]
    fn test_named_captures() {
        let handler = Arc::new(
            Handler::builder("remember")
                .route(route(r"^remember\s+(?<thing>.+)$", "remember").command(true))
                .build()
                .unwrap(),
        );
        let routed = router().route(&[handler], &[], &message("!remember blue").directed());
        assert_eq!(routed.matches[0].captures().name("thing"), Some("blue"));
    }

    #[test]
    fn test_first_rejecting_guard_short_circuits() {
        let handler = Arc::new(
            Handler::builder("admin")
                .route(route("^shutdown$", "shutdown").restrict_to("admins"))
                .route(route("^shutdown$", "log_attempt"))
                .build()
                .unwrap(),
        );
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = later_calls.clone();
        let guards: Vec<BoxedGuard> = vec![
            Arc::new(RestrictionGuard::new().group("admins", ["2"])) as BoxedGuard,
            Arc::new(move |_: &Route, _: &Message| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }) as BoxedGuard,
        ];

        let routed = router().route(&[handler], &guards, &message("shutdown"));
        assert_eq!(methods(&routed), ["log_attempt"]);
        assert_eq!(routed.rejected.len(), 1);
        assert_eq!(routed.rejected[0].route().method(), "shutdown");
        assert_eq!(later_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restriction_guard_admits_members() {
        let guard = RestrictionGuard::new().group("admins", ["1"]);
        let restricted = route("^x$", "x").restrict_to("admins");
        assert!(guard.allow(&restricted, &message("x")));
        assert!(!RestrictionGuard::new().allow(&restricted, &message("x")));
        assert!(RestrictionGuard::new().allow(&route("^x$", "y"), &message("x")));
    }
}
