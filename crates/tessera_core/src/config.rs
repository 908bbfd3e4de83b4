//! # Scene Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so partial
//! files are valid.
//!
//! ```toml
//! entity_capacity = 4096
//! component_capacity = 32
//! default_storage = "dense"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::StorageKind;
use crate::error::{EcsError, EcsResult};

/// Sizing and defaults for one [`EntityScene`](crate::EntityScene).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Entity slots reserved up front.
    pub entity_capacity: usize,
    /// Component types expected to be registered.
    pub component_capacity: usize,
    /// Backend used by `register_default_component`.
    pub default_storage: StorageKind,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 1000,
            component_capacity: 32,
            default_storage: StorageKind::Sparse,
        }
    }
}

impl SceneConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Config`] if the text is not valid TOML or has
    /// fields of the wrong type.
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        toml::from_str(text).map_err(|e| EcsError::Config(e.to_string()))
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EcsError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SceneConfig::default();
        assert_eq!(config.entity_capacity, 1000);
        assert_eq!(config.component_capacity, 32);
        assert_eq!(config.default_storage, StorageKind::Sparse);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SceneConfig::from_toml_str("default_storage = \"dense\"").unwrap();
        assert_eq!(config.default_storage, StorageKind::Dense);
        assert_eq!(config.entity_capacity, 1000);

        assert_eq!(SceneConfig::from_toml_str("").unwrap(), SceneConfig::default());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            SceneConfig::from_toml_str("entity_capacity = \"lots\""),
            Err(EcsError::Config(_))
        ));
        assert!(matches!(
            SceneConfig::load("/nonexistent/scene.toml"),
            Err(EcsError::Config(_))
        ));
    }
}
