//! [`Response`]: what a route action receives and writes replies into.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use pewter_core::{Message, User, shell_split};
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::router::RouteMatch;
use crate::users::UserStore;

// ============================================================================
// MatchData
// ============================================================================

/// Owned capture groups of one pattern match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchData {
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl MatchData {
    pub(crate) fn new(pattern: &Regex, captures: &Captures<'_>) -> Self {
        let groups = captures
            .iter()
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let named = pattern
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Self { groups, named }
    }

    /// Group `index`; `0` is the whole match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index)?.as_deref()
    }

    /// A named group.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Number of groups including the whole match.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ============================================================================
// Reply
// ============================================================================

/// A batch of outbound strings queued by an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Sent back where the message came from.
    Public(Vec<String>),
    /// Sent to the sender on a private channel.
    Private(Vec<String>),
    /// Sent back where the message came from, prefixed with a mention of the sender.
    Mention(Vec<String>),
}

// ============================================================================
// Response
// ============================================================================

struct Inner {
    message: Message,
    text: String,
    captures: MatchData,
    handler: String,
    method: String,
    config: Arc<Value>,
    users: UserStore,
    replies: Mutex<Vec<Reply>>,
}

/// The reply builder bound to one route match.
///
/// Cloning is cheap and every clone shares the same reply buffer. The robot
/// drains the buffer with [`take_replies`](Self::take_replies) after the
/// action completes, whether it succeeded or not.
#[derive(Clone)]
pub struct Response {
    inner: Arc<Inner>,
}

impl Response {
    /// Creates the response for `matched`.
    ///
    /// `config` is the handler's `handlers.<namespace>` section.
    pub fn new(message: Message, matched: &RouteMatch, config: Arc<Value>, users: UserStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                message,
                text: matched.text().to_string(),
                captures: matched.captures().clone(),
                handler: matched.handler().namespace().to_string(),
                method: matched.route().method().to_string(),
                config,
                users,
                replies: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn message(&self) -> &Message {
        &self.inner.message
    }

    pub fn user(&self) -> &User {
        self.inner.message.user()
    }

    /// The text the pattern was applied to, with any mention prefix removed.
    pub fn text(&self) -> &str {
        &self.inner.text
    }

    pub fn captures(&self) -> &MatchData {
        &self.inner.captures
    }

    /// Shell-split words of [`text`](Self::text) after the first.
    pub fn args(&self) -> Vec<String> {
        shell_split(&self.inner.text).into_iter().skip(1).collect()
    }

    /// Namespace of the handler that owns the matched route.
    pub fn handler(&self) -> &str {
        &self.inner.handler
    }

    /// Name of the matched route's method.
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Deserializes the handler's config section.
    pub fn try_config<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.inner.config.as_ref())
    }

    /// Like [`try_config`](Self::try_config), falling back to `T::default()`
    /// with a warning when the section does not deserialize.
    pub fn config<T: DeserializeOwned + Default>(&self) -> T {
        self.try_config().unwrap_or_else(|e| {
            warn!(handler = %self.inner.handler, error = %e, "Handler config is malformed, using defaults");
            T::default()
        })
    }

    pub fn users(&self) -> &UserStore {
        &self.inner.users
    }

    /// Replies where the message came from.
    pub fn reply(&self, text: impl Into<String>) {
        self.push(Reply::Public(vec![text.into()]));
    }

    /// Replies to the sender on a private channel.
    pub fn reply_privately(&self, text: impl Into<String>) {
        self.push(Reply::Private(vec![text.into()]));
    }

    /// Replies where the message came from, mentioning the sender.
    pub fn reply_with_mention(&self, text: impl Into<String>) {
        self.push(Reply::Mention(vec![text.into()]));
    }

    fn push(&self, reply: Reply) {
        self.inner.replies.lock().push(reply);
    }

    /// Drains queued replies in the order they were written.
    pub fn take_replies(&self) -> Vec<Reply> {
        std::mem::take(&mut *self.inner.replies.lock())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("handler", &self.inner.handler)
            .field("method", &self.inner.method)
            .field("text", &self.inner.text)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use pewter_core::{MemoryStorage, RobotIdentity, Source};
    use serde_json::json;
    use tower::BoxError;

    use super::*;
    use crate::handler::Handler;
    use crate::route::Route;
    use crate::router::Router;

    async fn noop(_response: Response) -> Result<(), BoxError> {
        Ok(())
    }

    fn response(body: &str, config: Value) -> Response {
        let handler = Arc::new(
            Handler::builder("todo")
                .route(Route::new(r"^todo\s+(?<verb>\w+)", "todo", noop).unwrap().command(true))
                .build()
                .unwrap(),
        );
        let message = Message::new(body, Source::new(User::new("1", "Carl"))).directed();
        let router = Router::new(&RobotIdentity::new("Pewter")).unwrap();
        let routed = router.route(&[handler], &[], &message);
        Response::new(
            message,
            &routed.matches[0],
            Arc::new(config),
            UserStore::new(Arc::new(MemoryStorage::new())),
        )
    }

    #[test]
    fn test_args_and_captures_use_stripped_text() {
        let response = response(r#"Pewter: todo add "buy milk" today"#, Value::Null);
        assert_eq!(response.text(), r#"todo add "buy milk" today"#);
        assert_eq!(response.args(), ["add", "buy milk", "today"]);
        assert_eq!(response.captures().name("verb"), Some("add"));
        assert_eq!(response.captures().get(1), Some("add"));
        assert_eq!(response.handler(), "todo");
        assert_eq!(response.method(), "todo");
    }

    #[test]
    fn test_replies_are_buffered_in_order_and_drained_once() {
        let response = response("todo list", Value::Null);
        let clone = response.clone();
        response.reply("one");
        clone.reply_privately("two");
        response.reply_with_mention("three");

        assert_eq!(
            response.take_replies(),
            vec![
                Reply::Public(vec!["one".into()]),
                Reply::Private(vec!["two".into()]),
                Reply::Mention(vec!["three".into()]),
            ]
        );
        assert!(clone.take_replies().is_empty());
    }

    #[test]
    fn test_config_falls_back_to_default() {
        #[derive(serde::Deserialize, Default, Debug, PartialEq)]
        struct TodoConfig {
            #[serde(default)]
            max_items: u32,
        }

        let configured = response("todo list", json!({ "max_items": 5 }));
        assert_eq!(configured.config::<TodoConfig>().max_items, 5);

        let unconfigured = response("todo list", Value::Null);
        assert_eq!(unconfigured.config::<TodoConfig>(), TodoConfig::default());
    }

    #[test]
    fn test_malformed_config_is_reported() {
        #[derive(serde::Deserialize, Default, Debug, PartialEq)]
        struct TodoConfig {
            max_items: u32,
        }

        let malformed = response("todo list", json!({ "max_items": "lots" }));
        assert!(malformed.try_config::<TodoConfig>().is_err());
        assert_eq!(malformed.config::<TodoConfig>(), TodoConfig::default());
    }
}
