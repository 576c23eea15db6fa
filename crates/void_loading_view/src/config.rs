//! View configuration
//!
//! Read from the `[view]` table:
//!
//! ```toml
//! [view]
//! debounce_ms = 500
//! tick_ms = 50
//! surfaces = ["tips", "cutscene"]
//! ```
//!
//! `VOID_LOADING_DEBOUNCE_MS` overrides the debounce window.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use void_loading::ConfigError;

/// Presentation binding configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Quiet period a state must survive before the view reacts to it
    pub debounce_ms: u64,
    /// Period of the driver's recurring timer
    pub tick_ms: u64,
    /// Names of the typed loading surfaces
    pub surfaces: Vec<String>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            tick_ms: 50,
            surfaces: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    view: ViewConfig,
}

impl ViewConfig {
    /// Parse the `[view]` table of a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        Ok(file.view)
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
        if let Ok(value) = std::env::var("VOID_LOADING_DEBOUNCE_MS") {
            self.set_debounce_override(&value);
        }
        self
    }

    fn set_debounce_override(&mut self, value: &str) {
        match value.trim().parse() {
            Ok(ms) => {
                self.debounce_ms = ms;
                log::info!("Debounce window from env: {}ms", ms);
            }
            Err(_) => log::warn!("Ignoring VOID_LOADING_DEBOUNCE_MS={}", value),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Tick period; never zero
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn with_surfaces<I, S>(mut self, surfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.surfaces = surfaces.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_view_table() {
        let config = ViewConfig::from_toml_str(
            r#"
            [loading]
            settle_delay_ms = 0

            [view]
            debounce_ms = 250
            surfaces = ["tips", "cutscene"]
            "#,
        )
        .unwrap();

        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert_eq!(config.tick(), Duration::from_millis(50));
        assert_eq!(config.surfaces, vec!["tips", "cutscene"]);
    }

    #[test]
    fn test_zero_tick_is_clamped() {
        let config = ViewConfig {
            tick_ms: 0,
            ..ViewConfig::default()
        };
        assert_eq!(config.tick(), Duration::from_millis(1));
    }

    #[test]
    fn test_debounce_override() {
        let mut config = ViewConfig::default();
        config.set_debounce_override("120");
        assert_eq!(config.debounce_ms, 120);

        config.set_debounce_override("later");
        assert_eq!(config.debounce_ms, 120);
    }
}
