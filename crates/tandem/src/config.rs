//! Engine configuration.
//!
//! ```toml
//! [scheduler]
//! idle_interval_ms = 50
//! thread_name = "tandem-animation"
//!
//! [render]
//! target_fps = 120
//! frame_budget_us = 8333
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tandem_core::{load_toml, parse_toml, ConfigError, ConfigResult, SchedulerConfig};
use tandem_rendering::RenderLoopConfig;

/// Everything the engine reads at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Animation scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Frame loop settings.
    pub render: RenderLoopConfig,
}

impl EngineConfig {
    /// Checks value ranges of every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values.
    pub fn validate(&self) -> ConfigResult<()> {
        self.scheduler.validate()?;
        if self.render.target_fps == 0 {
            return Err(ConfigError::Invalid(
                "render.target_fps must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = parse_toml(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O, parse or validation error.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_are_optional() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            "[scheduler]\nidle_interval_ms = 5\n\n[render]\ntarget_fps = 30\n",
        )
        .unwrap();
        assert_eq!(config.scheduler.idle_interval_ms, 5);
        assert_eq!(config.scheduler.thread_name, SchedulerConfig::default().thread_name);
        assert_eq!(config.render.target_fps, 30);
    }

    #[test]
    fn test_zero_fps_rejected() {
        let err = EngineConfig::from_toml_str("[render]\ntarget_fps = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
