//! Locale path registration and selection.
//!
//! Message catalogues themselves are out of scope; the runtime only tracks
//! the search list and the selected locales, and forwards changes to a
//! [`LocaleBackend`].

use std::path::{Path, PathBuf};

/// Receives locale changes from the registry.
pub trait LocaleBackend: Send + Sync {
    /// Called with the full search list after paths were added.
    fn reload(&self, paths: &[PathBuf]);

    fn set_locale(&self, locale: &str);

    fn set_default_locale(&self, locale: &str);
}

/// Backend that ignores every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLocaleBackend;

impl LocaleBackend for NoopLocaleBackend {
    fn reload(&self, _paths: &[PathBuf]) {}

    fn set_locale(&self, _locale: &str) {}

    fn set_default_locale(&self, _locale: &str) {}
}

/// One locale path or several.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalePaths(pub Vec<PathBuf>);

impl From<&str> for LocalePaths {
    fn from(path: &str) -> Self {
        Self(vec![PathBuf::from(path)])
    }
}

impl From<&Path> for LocalePaths {
    fn from(path: &Path) -> Self {
        Self(vec![path.to_path_buf()])
    }
}

impl From<PathBuf> for LocalePaths {
    fn from(path: PathBuf) -> Self {
        Self(vec![path])
    }
}

impl<P: Into<PathBuf>> From<Vec<P>> for LocalePaths {
    fn from(paths: Vec<P>) -> Self {
        Self(paths.into_iter().map(Into::into).collect())
    }
}

/// `es_MX.UTF-8` becomes `es-MX.UTF-8`.
pub fn normalize_locale(locale: &str) -> String {
    locale.trim().replace('_', "-")
}
