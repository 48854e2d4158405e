//! User override loader using figment.
//!
//! The loader collects only what the user supplied. Built-in defaults live in
//! the [`ConfigTree`](pewter_core::ConfigTree), and the robot applies the
//! loaded value on top of it leaf by leaf, so an override for a path nobody
//! declared is rejected instead of silently ignored.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML files (`pewter.toml`, `config.toml`)
//! - `yaml-config`: enables YAML files (`pewter.yaml`, `pewter.yml`, `config.yaml`, `config.yml`)
//!
//! # Priority (lowest to highest)
//!
//! 1. Configuration file (given explicitly, or the first one found on the search path)
//! 2. Environment variables (`PEWTER_*`)
//!
//! # Environment Variable Mapping
//!
//! - `PEWTER_ROBOT__NAME=Marvin` → `robot.name = "Marvin"`
//! - `PEWTER_HTTP__PORT=3333` → `http.port = 3333`
//! - `PEWTER_ADAPTERS__SHELL__PRIVATE_CHAT=true` → `adapters.shell.private_chat = true`
//!
//! # Example
//!
//! ```rust,ignore
//! let overrides = ConfigLoader::new()
//!     .file("./pewter.toml")
//!     .load()?;
//! tree.apply(&overrides)?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::Env;
use serde_json::Value;
use tracing::{debug, info, trace};

use pewter_core::{ConfigError, ConfigResult};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "PEWTER_";

/// Figment-based loader for user configuration overrides.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds `<user config dir>/pewter` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("pewter"))
        } else {
            self
        }
    }

    /// Loads exactly this file instead of searching. A missing file is an error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the file only when `path` is `Some`.
    pub fn maybe_file<P: AsRef<Path>>(self, path: Option<P>) -> Self {
        match path {
            Some(path) => self.file(path),
            None => self,
        }
    }

    /// Enables environment overrides (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Loads every override as one nested JSON object.
    pub fn load(self) -> ConfigResult<Value> {
        let figment = self.build_figment()?;
        let overrides: Value = figment
            .extract()
            .map_err(|e| ConfigError::load(format!("Failed to extract configuration: {e}")))?;
        debug!(
            sections = overrides.as_object().map_or(0, |o| o.len()),
            "Configuration overrides loaded"
        );
        Ok(overrides)
    }

    fn build_figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::new();

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment overrides");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    /// Merges one file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::load(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("pewter"));
        }
        paths
    }

    /// First existing `search_path/name`, paths outermost.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn find_file(search_paths: &[PathBuf], names: &[&str]) -> Option<PathBuf> {
        search_paths
            .iter()
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .find(|path| path.exists())
    }

    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        if let Some(path) = Self::find_file(&search_paths, &["pewter.toml", "config.toml"]) {
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
            found = true;
        }

        #[cfg(feature = "yaml-config")]
        if let Some(path) = Self::find_file(
            &search_paths,
            &["pewter.yaml", "pewter.yml", "config.yaml", "config.yml"],
        ) {
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Yaml::file(path));
            found = true;
        }

        if !found {
            debug!("No configuration file found, using defaults");
        }
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================
