//! The configuration tree.
//!
//! Configuration is a tree of named [`Section`]s whose leaves are typed
//! [`Attribute`]s. The runtime seeds the tree with built-in defaults, grafts
//! in the sections declared by registered adapters and handlers, applies the
//! user's overrides and validates the result before the robot may run.
//!
//! ```rust,ignore
//! let tree = ConfigTree::new()
//!     .section("robot", |s| {
//!         s.attribute(Attribute::new("name").kind(ValueKind::String).default("Pewter").required())
//!     });
//!
//! assert_eq!(tree.get("robot.name"), Some(&json!("Pewter")));
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

// ============================================================================
// ValueKind
// ============================================================================

/// The JSON kinds an attribute may be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    /// Returns `true` when `value` is of this kind.
    ///
    /// Integers are accepted where floats are expected.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// The kind name of an arbitrary value, for error messages.
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_f64() => "float",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Attribute
// ============================================================================

/// A validation predicate. Returns a human-readable reason on rejection.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A typed configuration leaf.
#[derive(Clone)]
pub struct Attribute {
    name: String,
    default: Value,
    value: Value,
    kinds: Vec<ValueKind>,
    validator: Option<Validator>,
    required: bool,
}

impl Attribute {
    /// An unconstrained attribute with no default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Value::Null,
            value: Value::Null,
            kinds: Vec::new(),
            validator: None,
            required: false,
        }
    }

    /// Accepts values of `kind`. May be called more than once.
    pub fn kind(mut self, kind: ValueKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// Sets the default, which is also the current value.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self.value = self.default.clone();
        self
    }

    /// Marks the attribute as required: it must be non-null to validate.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds a predicate run after the kind check.
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Restricts a string attribute to one of `choices`.
    pub fn one_of(self, choices: &'static [&'static str]) -> Self {
        self.validate(move |value| match value.as_str() {
            Some(s) if choices.contains(&s) => Ok(()),
            _ => Err(format!("must be one of {}", choices.join(", "))),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn kinds(&self) -> &[ValueKind] {
        &self.kinds
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Checks the current value. `path` is the dotted path used in errors.
    pub fn check(&self, path: &str) -> ConfigResult<()> {
        if self.value.is_null() {
            return if self.required {
                Err(ConfigError::missing_field(path))
            } else {
                Ok(())
            };
        }

        if !self.kinds.is_empty() && !self.kinds.iter().any(|k| k.matches(&self.value)) {
            let expected: Vec<&str> = self.kinds.iter().map(|k| k.as_str()).collect();
            return Err(ConfigError::validation(
                path,
                format!(
                    "expected {}, got {}",
                    expected.join(" or "),
                    ValueKind::describe(&self.value)
                ),
            ));
        }

        if let Some(validator) = &self.validator {
            validator(&self.value).map_err(|message| ConfigError::validation(path, message))?;
        }

        Ok(())
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("kinds", &self.kinds)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Section
// ============================================================================

#[derive(Debug, Clone)]
enum Node {
    Attribute(Attribute),
    Section(Section),
}

impl Node {
    fn name(&self) -> &str {
        match self {
            Self::Attribute(a) => a.name(),
            Self::Section(s) => s.name(),
        }
    }
}

/// A named group of attributes and nested sections.
///
/// Children keep declaration order; declaring a child whose name already
/// exists replaces it in place.
#[derive(Debug, Clone)]
pub struct Section {
    name: String,
    children: Vec<Node>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the section declares nothing.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Declares an attribute.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.put(Node::Attribute(attribute));
        self
    }

    /// Declares a nested section built by `build`.
    pub fn section<F>(mut self, name: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(Section) -> Section,
    {
        self.put(Node::Section(build(Section::new(name))));
        self
    }

    /// Inserts an already-built nested section.
    pub fn insert_section(&mut self, section: Section) {
        self.put(Node::Section(section));
    }

    fn put(&mut self, node: Node) {
        match self.children.iter_mut().find(|c| c.name() == node.name()) {
            Some(existing) => *existing = node,
            None => self.children.push(node),
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name() == name)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name() == name)
    }

    /// The nested section called `name`, if any.
    pub fn subsection(&self, name: &str) -> Option<&Section> {
        match self.child(name) {
            Some(Node::Section(s)) => Some(s),
            _ => None,
        }
    }

    /// Current values as a JSON object.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .children
            .iter()
            .map(|node| match node {
                Node::Attribute(a) => (a.name.clone(), a.value.clone()),
                Node::Section(s) => (s.name.clone(), s.to_value()),
            })
            .collect();
        Value::Object(map)
    }

    fn collect_attributes<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Attribute)>) {
        for node in &self.children {
            let path = if prefix.is_empty() {
                node.name().to_string()
            } else {
                format!("{prefix}.{}", node.name())
            };
            match node {
                Node::Attribute(a) => out.push((path, a)),
                Node::Section(s) => s.collect_attributes(&path, out),
            }
        }
    }

    fn apply(&mut self, prefix: &str, overrides: &Map<String, Value>) -> ConfigResult<()> {
        for (key, value) in overrides {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match self.child_mut(key) {
                Some(Node::Section(section)) => match value {
                    Value::Object(map) => section.apply(&path, map)?,
                    other => {
                        return Err(ConfigError::validation(
                            path,
                            format!("expected a section, got {}", ValueKind::describe(other)),
                        ));
                    }
                },
                Some(Node::Attribute(attribute)) => attribute.value = value.clone(),
                None => return Err(ConfigError::UnknownAttribute(path)),
            }
        }
        Ok(())
    }
}

// ============================================================================
// ConfigTree
// ============================================================================

/// The root of the configuration.
#[derive(Debug, Clone)]
pub struct ConfigTree {
    root: Section,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self {
            root: Section::new(""),
        }
    }

    /// Declares a top-level section built by `build`.
    pub fn section<F>(mut self, name: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(Section) -> Section,
    {
        self.root.put(Node::Section(build(Section::new(name))));
        self
    }

    /// Inserts `section` under the section at `parent` (dotted path), creating
    /// intermediate sections as needed. An empty `parent` means the root.
    pub fn graft(&mut self, parent: &str, section: Section) -> ConfigResult<()> {
        let mut current = &mut self.root;
        for segment in parent.split('.').filter(|s| !s.is_empty()) {
            if current.child(segment).is_none() {
                current.insert_section(Section::new(segment));
            }
            current = match current.child_mut(segment) {
                Some(Node::Section(s)) => s,
                _ => return Err(ConfigError::validation(parent, "not a section")),
            };
        }
        current.insert_section(section);
        Ok(())
    }

    /// The current value of the attribute at `path`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        match self.node(path)? {
            Node::Attribute(a) => Some(a.value()),
            Node::Section(_) => None,
        }
    }

    /// The current value at `path` as a string slice.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Assigns to the attribute at `path`.
    ///
    /// Fails with [`ConfigError::UnknownAttribute`] when `path` does not name
    /// a declared attribute. Values are checked later, by validation.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> ConfigResult<()> {
        match self.node_mut(path) {
            Some(Node::Attribute(a)) => {
                a.value = value.into();
                Ok(())
            }
            _ => Err(ConfigError::UnknownAttribute(path.to_string())),
        }
    }

    /// Applies a nested JSON object of overrides, leaf by leaf.
    pub fn apply(&mut self, overrides: &Value) -> ConfigResult<()> {
        match overrides {
            Value::Null => Ok(()),
            Value::Object(map) => self.root.apply("", map),
            other => Err(ConfigError::load(format!(
                "configuration must be a table, got {}",
                ValueKind::describe(other)
            ))),
        }
    }

    /// The section at `path`.
    pub fn section_at(&self, path: &str) -> Option<&Section> {
        match self.node(path)? {
            Node::Section(s) => Some(s),
            Node::Attribute(_) => None,
        }
    }

    /// Deserializes the section at `path` into `T`.
    pub fn section_as<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<T> {
        let section = self
            .section_at(path)
            .ok_or_else(|| ConfigError::UnknownAttribute(path.to_string()))?;
        T::deserialize(section.to_value()).map_err(|e| ConfigError::validation(path, e.to_string()))
    }

    /// Every attribute with its dotted path, depth-first in declaration order.
    pub fn attributes(&self) -> Vec<(String, &Attribute)> {
        let mut out = Vec::new();
        self.root.collect_attributes("", &mut out);
        out
    }

    /// Current values as a nested JSON object.
    pub fn to_value(&self) -> Value {
        self.root.to_value()
    }

    fn node(&self, path: &str) -> Option<&Node> {
        let mut segments = path.split('.');
        let mut node = self.root.child(segments.next()?)?;
        for segment in segments {
            node = match node {
                Node::Section(s) => s.child(segment)?,
                Node::Attribute(_) => return None,
            };
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut segments = path.split('.');
        let mut node = self.root.child_mut(segments.next()?)?;
        for segment in segments {
            node = match node {
                Node::Section(s) => s.child_mut(segment)?,
                Node::Attribute(_) => return None,
            };
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> ConfigTree {
        ConfigTree::new()
            .section("robot", |s| {
                s.attribute(
                    Attribute::new("name")
                        .kind(ValueKind::String)
                        .default("Pewter")
                        .required(),
                )
                .attribute(Attribute::new("alias").kind(ValueKind::String))
            })
            .section("http", |s| {
                s.attribute(
                    Attribute::new("port")
                        .kind(ValueKind::Integer)
                        .default(8080)
                        .validate(|v| match v.as_u64() {
                            Some(1..=65535) => Ok(()),
                            _ => Err("must be a port number".to_string()),
                        }),
                )
            })
    }

    #[test]
    fn test_set_then_get() {
        let mut tree = tree();
        assert_eq!(tree.get_str("robot.name"), Some("Pewter"));

        tree.set("robot.name", "Botbot").unwrap();
        assert_eq!(tree.get_str("robot.name"), Some("Botbot"));
        assert_eq!(tree.section_at("robot").unwrap().to_value()["name"], json!("Botbot"));
    }

    #[test]
    fn test_set_unknown_path_fails() {
        let mut tree = tree();
        assert!(matches!(
            tree.set("robot.nickname", "x"),
            Err(ConfigError::UnknownAttribute(p)) if p == "robot.nickname"
        ));
        assert!(tree.set("robot", "x").is_err());
        assert!(tree.set("robot.name.first", "x").is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut tree = tree();
        tree.apply(&json!({ "robot": { "name": "testbot" }, "http": { "port": 3333 } }))
            .unwrap();
        assert_eq!(tree.get_str("robot.name"), Some("testbot"));
        assert_eq!(tree.get("http.port"), Some(&json!(3333)));

        let err = tree.apply(&json!({ "robot": { "colour": "blue" } })).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAttribute(p) if p == "robot.colour"));

        assert!(tree.apply(&json!({ "robot": "flat" })).is_err());
    }

    #[test]
    fn test_check_kinds_required_and_predicate() {
        let mut tree = tree();
        for (path, attribute) in tree.attributes() {
            attribute.check(&path).unwrap();
        }

        tree.set("http.port", "eighty").unwrap();
        tree.set("robot.name", Value::Null).unwrap();
        let errors: Vec<ConfigError> = tree
            .attributes()
            .into_iter()
            .filter_map(|(path, a)| a.check(&path).err())
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], ConfigError::MissingField { field } if field == "robot.name"));
        assert!(matches!(&errors[1], ConfigError::Validation { path, .. } if path == "http.port"));

        tree.set("http.port", 0).unwrap();
        let port = tree.attributes().into_iter().find(|(p, _)| p == "http.port").unwrap();
        assert!(port.1.check(&port.0).unwrap_err().to_string().contains("port number"));
    }

    #[test]
    fn test_graft_creates_parents() {
        let mut tree = tree();
        tree.graft(
            "handlers",
            Section::new("weather").attribute(Attribute::new("api_key").kind(ValueKind::String)),
        )
        .unwrap();
        tree.set("handlers.weather.api_key", "secret").unwrap();
        assert_eq!(tree.get_str("handlers.weather.api_key"), Some("secret"));
        assert!(tree.graft("robot.name", Section::new("x")).is_err());
    }

    #[test]
    fn test_section_as() {
        #[derive(serde::Deserialize)]
        struct Robot {
            name: String,
            alias: Option<String>,
        }

        let robot: Robot = tree().section_as("robot").unwrap();
        assert_eq!(robot.name, "Pewter");
        assert!(robot.alias.is_none());
    }
}
