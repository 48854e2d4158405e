//! Configuration validation utilities.

use pewter_core::{ConfigError, ConfigResult, ConfigTree};
use tracing::error;

/// Every attribute that fails its check, in tree order.
pub fn violations(tree: &ConfigTree) -> Vec<ConfigError> {
    tree.attributes()
        .into_iter()
        .filter_map(|(path, attribute)| attribute.check(&path).err())
        .collect()
}

/// Validates the whole tree.
///
/// The first violation is returned for the caller to report; any others are
/// logged here.
pub fn validate(tree: &ConfigTree) -> ConfigResult<()> {
    let mut found = violations(tree).into_iter();
    let Some(first) = found.next() else {
        return Ok(());
    };
    for other in found {
        error!(error = %other, "Invalid configuration");
    }
    Err(first)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::config::default_tree;

    #[test]
    fn test_defaults_are_valid() {
        assert!(violations(&default_tree()).is_empty());
        validate(&default_tree()).unwrap();
    }

    #[test]
    fn test_missing_required_field() {
        let mut tree = default_tree();
        tree.set("robot.adapter", Value::Null).unwrap();
        let err = validate(&tree).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "robot.adapter"));
    }

    #[test]
    fn test_all_violations_are_reported() {
        let mut tree = default_tree();
        tree.set("robot.name", Value::Null).unwrap();
        tree.set("http.port", json!(0)).unwrap();
        tree.set("robot.log_format", json!(3)).unwrap();

        let found = violations(&tree);
        assert_eq!(found.len(), 3);
        assert!(matches!(&found[0], ConfigError::MissingField { field } if field == "robot.name"));
    }
}
