//! Typed views over the built-in configuration sections.

use std::fmt;
use std::path::PathBuf;

use pewter_core::RobotIdentity;
use serde::{Deserialize, Serialize};

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `Compact` otherwise.
    Json,
}

/// The `robot` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RobotSettings {
    pub name: String,
    #[serde(default)]
    pub mention_name: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    pub adapter: String,
    pub locale: String,
    pub default_locale: String,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub admins: Vec<String>,
}

impl RobotSettings {
    /// The names the robot answers to.
    pub fn identity(&self) -> RobotIdentity {
        let mut identity = RobotIdentity::new(self.name.clone());
        if let Some(mention_name) = self.mention_name.as_deref().filter(|m| !m.trim().is_empty()) {
            identity = identity.mention_name(mention_name);
        }
        if let Some(alias) = self.alias.as_deref().filter(|a| !a.trim().is_empty()) {
            identity = identity.alias(alias);
        }
        identity
    }
}

/// The `storage` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub namespace: String,
}

/// The `http` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
}
