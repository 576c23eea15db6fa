//! Loading Configuration
//!
//! Tunables of the loading service, read from the `[loading]` table of a TOML
//! file and overridden from the environment.
//!
//! # Example Config File
//!
//! ```toml
//! [loading]
//! settle_delay_ms = 16       # pause after each scene operation, 0 disables
//! parallel_state = "idle"    # idle, tracked
//! ```
//!
//! # Environment Overrides
//!
//! - `VOID_LOADING_SETTLE_MS=0`
//! - `VOID_LOADING_PARALLEL_STATE=tracked`

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How a parallel batch reports state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParallelStateMode {
    /// Publish Idle at start and end, nothing in between
    Idle,
    /// Publish Loading, mean progress, then Idle
    Tracked,
}

impl Default for ParallelStateMode {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for ParallelStateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Tracked => write!(f, "tracked"),
        }
    }
}

impl std::str::FromStr for ParallelStateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "tracked" => Ok(Self::Tracked),
            _ => Err(format!("Unknown parallel state mode: {}", s)),
        }
    }
}

/// Loading service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    /// Delay after each scene operation completes, in milliseconds
    pub settle_delay_ms: u64,
    /// State reporting of parallel batches
    pub parallel_state: ParallelStateMode,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 16,
            parallel_state: ParallelStateMode::Idle,
        }
    }
}

/// File layout when the loading table sits inside a larger document
#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    loading: LoadingConfig,
}

impl LoadingConfig {
    /// Parse the `[loading]` table of a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        Ok(file.loading)
    }

    /// Read and parse a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Apply environment overrides
    pub fn apply_env(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("VOID_LOADING_SETTLE_MS") {
            match value.trim().parse() {
                Ok(ms) => {
                    self.settle_delay_ms = ms;
                    log::info!("Settle delay from env: {}ms", ms);
                }
                Err(_) => log::warn!("Ignoring VOID_LOADING_SETTLE_MS={}", value),
            }
        }

        if let Some(value) = lookup("VOID_LOADING_PARALLEL_STATE") {
            match value.parse() {
                Ok(mode) => {
                    self.parallel_state = mode;
                    log::info!("Parallel state mode from env: {}", mode);
                }
                Err(err) => log::warn!("Ignoring VOID_LOADING_PARALLEL_STATE: {}", err),
            }
        }
    }

    /// Settle delay as a duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = LoadingConfig::default();
        assert_eq!(config.settle_delay(), Duration::from_millis(16));
        assert_eq!(config.parallel_state, ParallelStateMode::Idle);
    }

    #[test]
    fn test_parse_loading_table() {
        let config = LoadingConfig::from_toml_str(
            r#"
            [loading]
            settle_delay_ms = 0
            parallel_state = "tracked"

            [view]
            debounce_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.settle_delay(), Duration::ZERO);
        assert_eq!(config.parallel_state, ParallelStateMode::Tracked);
    }

    #[test]
    fn test_missing_table_uses_defaults() {
        assert_eq!(LoadingConfig::from_toml_str("").unwrap(), LoadingConfig::default());

        let partial = LoadingConfig::from_toml_str("[loading]\nsettle_delay_ms = 40\n").unwrap();
        assert_eq!(partial.settle_delay_ms, 40);
        assert_eq!(partial.parallel_state, ParallelStateMode::Idle);
    }

    #[test]
    fn test_parse_errors() {
        let err = LoadingConfig::from_toml_str("[loading]\nparallel_state = \"sideways\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = LoadingConfig::load("/definitely/not/here/loading.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("VOID_LOADING_SETTLE_MS", "5"),
            ("VOID_LOADING_PARALLEL_STATE", "Tracked"),
        ]
        .into_iter()
        .collect();

        let mut config = LoadingConfig::default();
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.settle_delay_ms, 5);
        assert_eq!(config.parallel_state, ParallelStateMode::Tracked);
    }

    #[test]
    fn test_bad_overrides_are_ignored() {
        let mut config = LoadingConfig::default();
        config.apply_overrides(|key| match key {
            "VOID_LOADING_SETTLE_MS" => Some("soon".to_string()),
            "VOID_LOADING_PARALLEL_STATE" => Some("sideways".to_string()),
            _ => None,
        });

        assert_eq!(config, LoadingConfig::default());
    }
}
