//! The built-in configuration tree.
//!
//! | Path | Kind | Default |
//! |------|------|---------|
//! | `robot.name` | string, required | `"Pewter"` |
//! | `robot.mention_name` | string | falls back to `robot.name` |
//! | `robot.alias` | string | none |
//! | `robot.adapter` | string, required | `"shell"` |
//! | `robot.locale` / `robot.default_locale` | string | `"en"` |
//! | `robot.log_level` | one of [`LOG_LEVELS`] | `"info"` |
//! | `robot.log_format` | one of [`LOG_FORMATS`] | `"compact"` |
//! | `robot.log_file` | string | none (stdout) |
//! | `robot.admins` | array of user ids | `[]` |
//! | `storage.namespace` | string, required | `"pewter"` |
//! | `http.host` | string | `"0.0.0.0"` |
//! | `http.port` | integer in `1..=65535` | `8080` |
//!
//! `adapters` and `handlers` start empty; the registry grafts in one section
//! per registered adapter and per handler that declares configuration.

use pewter_core::{Attribute, ConfigTree, ValueKind};
use serde_json::{Value, json};

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub const LOG_FORMATS: &[&str] = &["compact", "full", "pretty", "json"];

fn string(name: &str) -> Attribute {
    Attribute::new(name).kind(ValueKind::String)
}

fn all_strings(value: &Value) -> Result<(), String> {
    match value.as_array() {
        Some(items) if items.iter().all(Value::is_string) => Ok(()),
        _ => Err("must be a list of user ids".to_string()),
    }
}

fn port(value: &Value) -> Result<(), String> {
    match value.as_u64() {
        Some(1..=65535) => Ok(()),
        _ => Err("must be between 1 and 65535".to_string()),
    }
}

/// A fresh tree holding only the built-in defaults.
pub fn default_tree() -> ConfigTree {
    ConfigTree::new()
        .section("robot", |s| {
            s.attribute(string("name").default("Pewter").required())
                .attribute(string("mention_name"))
                .attribute(string("alias"))
                .attribute(string("adapter").default("shell").required())
                .attribute(string("locale").default("en"))
                .attribute(string("default_locale").default("en"))
                .attribute(string("log_level").default("info").one_of(LOG_LEVELS))
                .attribute(string("log_format").default("compact").one_of(LOG_FORMATS))
                .attribute(string("log_file"))
                .attribute(
                    Attribute::new("admins")
                        .kind(ValueKind::Array)
                        .default(json!([]))
                        .validate(all_strings),
                )
        })
        .section("storage", |s| {
            s.attribute(string("namespace").default("pewter").required())
        })
        .section("http", |s| {
            s.attribute(string("host").default("0.0.0.0")).attribute(
                Attribute::new("port")
                    .kind(ValueKind::Integer)
                    .default(8080)
                    .validate(port),
            )
        })
        .section("adapters", |s| s)
        .section("handlers", |s| s)
}
