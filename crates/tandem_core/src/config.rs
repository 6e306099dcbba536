//! Scheduler configuration, loaded once at startup.
//!
//! ```toml
//! idle_interval_ms = 100
//! start_paused = false
//! thread_name = "tandem-animation"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Milliseconds the scheduler thread idles per loop while paused or empty.
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 100;

/// Default name of the scheduler thread.
pub const DEFAULT_THREAD_NAME: &str = "tandem-animation";

/// Configuration for the animation scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How long the scheduler thread idles per loop while paused or while
    /// no animation is live.
    pub idle_interval_ms: u64,
    /// Whether the scheduler starts in the paused state.
    pub start_paused: bool,
    /// Name given to the scheduler thread (and prefix for free-running threads).
    pub thread_name: String,
}

impl SchedulerConfig {
    /// Returns the idle interval as a [`Duration`].
    #[must_use]
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the idle interval is zero or the
    /// thread name is empty.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.idle_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "idle_interval_ms must be greater than zero".into(),
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid("thread_name must not be empty".into()));
        }
        Ok(())
    }

    /// Parses and validates a scheduler configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a parse error or a validation error.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = parse_toml(text)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
            start_paused: false,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

/// Parses any deserializable configuration type from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the text does not match the schema.
pub fn parse_toml<T: DeserializeOwned>(text: &str) -> ConfigResult<T> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses a TOML configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, or
/// [`ConfigError::Parse`] if its contents do not match the schema.
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> ConfigResult<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml(&text)
}
