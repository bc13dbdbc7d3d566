use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Exploration parameters, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplorerConfig {
    /// Identity of the bot under test.
    pub target: String,

    /// The stimulus attached to the synthetic root.
    #[serde(default = "default_bootstrap_command")]
    pub bootstrap_command: String,

    /// Floor on total per-stimulus time, in seconds. Keeps pacing human-like
    /// even when the bot answers immediately.
    #[serde(default = "default_min_wait_secs")]
    pub min_wait_secs: f64,

    /// How long to wait for the first inbound update, in seconds.
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: f64,

    /// States at this depth are never expanded.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// A state whose value-equal occurrences along its branch reach this
    /// count is marked as a loop and pruned.
    #[serde(default = "default_max_repeats")]
    pub max_repeats: usize,
}

fn default_bootstrap_command() -> String {
    "/start".into()
}

fn default_min_wait_secs() -> f64 {
    10.0
}

fn default_response_timeout_secs() -> f64 {
    15.0
}

fn default_max_depth() -> usize {
    3
}

fn default_max_repeats() -> usize {
    1
}

impl ExplorerConfig {
    /// Config for `target` with every other field at its default.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            bootstrap_command: default_bootstrap_command(),
            min_wait_secs: default_min_wait_secs(),
            response_timeout_secs: default_response_timeout_secs(),
            max_depth: default_max_depth(),
            max_repeats: default_max_repeats(),
        }
    }

    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.is_empty() {
            return Err(ConfigError::Invalid("target must not be empty".into()));
        }
        if self.bootstrap_command.is_empty() {
            return Err(ConfigError::Invalid(
                "bootstrap_command must not be empty".into(),
            ));
        }
        if !self.min_wait_secs.is_finite() || self.min_wait_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_wait_secs must be non-negative, got {}",
                self.min_wait_secs
            )));
        }
        if !self.response_timeout_secs.is_finite() || self.response_timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "response_timeout_secs must be positive, got {}",
                self.response_timeout_secs
            )));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.max_repeats == 0 {
            return Err(ConfigError::Invalid(
                "max_repeats must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn min_wait(&self) -> Duration {
        Duration::from_secs_f64(self.min_wait_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.response_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_gets_defaults() {
        let config = ExplorerConfig::from_toml_str(r#"target = "photo_hero_bot""#).unwrap();
        assert_eq!(config.target, "photo_hero_bot");
        assert_eq!(config.bootstrap_command, "/start");
        assert_eq!(config.min_wait(), Duration::from_secs(10));
        assert_eq!(config.response_timeout(), Duration::from_secs(15));
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.max_repeats, 1);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = ExplorerConfig::from_toml_str(
            r#"
            target = "shop_bot"
            bootstrap_command = "/menu"
            min_wait_secs = 2.5
            response_timeout_secs = 4.0
            max_depth = 5
            max_repeats = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.bootstrap_command, "/menu");
        assert_eq!(config.min_wait(), Duration::from_secs_f64(2.5));
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.max_repeats, 2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = ExplorerConfig::from_toml_str(
            r#"
            target = "shop_bot"
            max_depht = 4
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_target_is_rejected() {
        assert!(ExplorerConfig::from_toml_str("").is_err());
    }

    #[test]
    fn zero_max_repeats_is_rejected() {
        let result = ExplorerConfig::from_toml_str(
            r#"
            target = "shop_bot"
            max_repeats = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn negative_timing_is_rejected() {
        let result = ExplorerConfig::from_toml_str(
            r#"
            target = "shop_bot"
            min_wait_secs = -1.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
