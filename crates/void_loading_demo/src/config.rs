//! Demo Configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment overrides (`VOID_LOADING_SETTLE_MS`, `VOID_LOADING_PARALLEL_STATE`,
//!    `VOID_LOADING_DEBOUNCE_MS`)
//! 2. Config file named by `VOID_LOADING_CONFIG`
//! 3. `./loading.toml`
//! 4. Built-in defaults
//!
//! # Example Config File
//!
//! ```toml
//! [loading]
//! settle_delay_ms = 16
//! parallel_state = "tracked"
//!
//! [view]
//! debounce_ms = 500
//! surfaces = ["tips"]
//!
//! [scenes]
//! catalogue = ["boot", "menu", "level_1", "level_2"]
//! steps = 5
//! step_ms = 100
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use void_loading::{ConfigError, LoadingConfig};
use void_loading_view::ViewConfig;

/// Simulated scene system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenesConfig {
    /// Scene names in build order
    pub catalogue: Vec<String>,
    /// Progress notifications per scene operation
    pub steps: u32,
    /// Delay between progress notifications
    pub step_ms: u64,
}

impl Default for ScenesConfig {
    fn default() -> Self {
        Self {
            catalogue: ["boot", "menu", "level_1", "level_2"]
                .into_iter()
                .map(String::from)
                .collect(),
            steps: 5,
            step_ms: 100,
        }
    }
}

impl ScenesConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub loading: LoadingConfig,
    pub view: ViewConfig,
    pub scenes: ScenesConfig,
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl DemoConfig {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, ConfigError> {
        let mut candidates = std::env::var_os("VOID_LOADING_CONFIG")
            .map(PathBuf::from)
            .into_iter()
            .chain(std::iter::once(PathBuf::from("loading.toml")));

        let mut config = Self::default();
        match candidates.find(|path| path.is_file()) {
            Some(path) => {
                config = Self::load_from_file(&path)?;
                log::info!("Loaded loading config from {}", path.display());
                config.config_path = Some(path);
            }
            None => log::info!("No loading config found, using defaults"),
        }

        config.loading = config.loading.apply_env();
        config.view = config.view.apply_env();
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_loading::ParallelStateMode;

    #[test]
    fn test_full_file() {
        let config = DemoConfig::from_toml_str(
            r#"
            [loading]
            parallel_state = "tracked"

            [view]
            surfaces = ["tips"]

            [scenes]
            catalogue = ["a", "b"]
            step_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.loading.parallel_state, ParallelStateMode::Tracked);
        assert_eq!(config.loading.settle_delay_ms, 16);
        assert_eq!(config.view.surfaces, vec!["tips"]);
        assert_eq!(config.view.debounce_ms, 500);
        assert_eq!(config.scenes.catalogue, vec!["a", "b"]);
        assert_eq!(config.scenes.step_delay(), Duration::from_millis(10));
        assert_eq!(config.scenes.steps, 5);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = DemoConfig::from_toml_str("").unwrap();
        assert_eq!(config.scenes.catalogue.len(), 4);
        assert!(config.config_path.is_none());
    }
}
