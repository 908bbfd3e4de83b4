//! # Engine Configuration
//!
//! ```toml
//! target_fps = 120
//! max_delta_seconds = 0.1
//! log_frame_stats = true
//!
//! [scene]
//! entity_capacity = 50000
//! default_storage = "dense"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tessera_core::SceneConfig;

use crate::error::{EngineError, EngineResult};

/// Engine settings. Missing keys fall back to their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scene sizing.
    pub scene: SceneConfig,
    /// Frame rate the budget is measured against.
    pub target_fps: u32,
    /// Upper bound on the delta fed to systems, in seconds.
    pub max_delta_seconds: f32,
    /// Emit a tracing event per frame.
    pub log_frame_stats: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            target_fps: 60,
            max_delta_seconds: 0.25,
            log_frame_stats: false,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] on malformed TOML, wrong field
    /// types, or a zero `target_fps`.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file cannot be read, otherwise
    /// the same errors as [`EngineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] describing the first bad value.
    pub fn validate(&self) -> EngineResult<()> {
        if self.target_fps == 0 {
            return Err(EngineError::Config("target_fps must be positive".into()));
        }
        if self.max_delta_seconds.is_nan() || self.max_delta_seconds <= 0.0 {
            return Err(EngineError::Config("max_delta_seconds must be positive".into()));
        }
        Ok(())
    }

    /// Wall-clock budget of one frame.
    #[must_use]
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}
