//! Inbound messages and the people and places they come from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// User
// ============================================================================

/// A chat user as seen by an adapter.
///
/// `metadata` is free-form and persisted through the storage capability by
/// the framework's user store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Adapter-specific unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Arbitrary persisted attributes.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl User {
    /// Creates a user with empty metadata.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            metadata: HashMap::new(),
        }
    }

    /// The name used when the bot mentions this user.
    ///
    /// Falls back to the display name when no `mention_name` is stored.
    pub fn mention_name(&self) -> &str {
        self.metadata
            .get("mention_name")
            .map(String::as_str)
            .unwrap_or(&self.name)
    }
}

// ============================================================================
// Source
// ============================================================================

/// Where a message came from, and where replies to it go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Source {
    /// The sender.
    pub user: User,
    /// The room or channel, absent for direct conversations.
    pub room: Option<String>,
    /// Whether the message arrived on a private channel.
    pub private: bool,
}

impl Source {
    /// A source for `user` with no room.
    pub fn new(user: User) -> Self {
        Self {
            user,
            room: None,
            private: false,
        }
    }

    /// Sets the room.
    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Marks the source as a private channel.
    pub fn private_message(mut self) -> Self {
        self.private = true;
        self
    }

    /// A copy of this source that targets the user privately.
    pub fn to_private(&self) -> Self {
        Self {
            user: self.user.clone(),
            room: None,
            private: true,
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: String,
    source: Source,
    directed: bool,
}

impl Message {
    /// Creates an undirected message.
    pub fn new(body: impl Into<String>, source: Source) -> Self {
        Self {
            body: body.into(),
            source,
            directed: false,
        }
    }

    /// Marks the message as explicitly addressed to the bot.
    pub fn directed(mut self) -> Self {
        self.directed = true;
        self
    }

    /// Raw message text.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn user(&self) -> &User {
        &self.source.user
    }

    /// Whether the bot should treat this message as a command.
    ///
    /// Private messages are always directed.
    pub fn is_directed(&self) -> bool {
        self.directed || self.source.private
    }

    /// Whether the message arrived on a private channel.
    pub fn is_private(&self) -> bool {
        self.source.private
    }
}

// ============================================================================
// RobotIdentity
// ============================================================================

/// The names the bot answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotIdentity {
    /// Display name.
    pub name: String,
    /// Name used in mentions; equals `name` unless configured.
    pub mention_name: String,
    /// Optional short prefix such as `!`.
    pub alias: Option<String>,
}

impl RobotIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            mention_name: name.clone(),
            name,
            alias: None,
        }
    }

    pub fn mention_name(mut self, mention_name: impl Into<String>) -> Self {
        self.mention_name = mention_name.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

// ============================================================================
// Argument splitting
// ============================================================================

/// Simple shell-like argument splitting for plain text.
///
/// Handles:
/// - Space-separated arguments
/// - Quoted strings (single and double quotes)
/// - Escape sequences within double quotes
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;
    let mut quoted = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if !in_single_quote => escape_next = true,
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }

    args
}
