//! Runtime configuration.
//!
//! Stored as a JSON object on disk; every field is optional:
//! ```json
//! {
//!   "default_timezone": "America/Los_Angeles",
//!   "validator": { "max_future_seconds": 60 }
//! }
//! ```

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Limits applied by the realtime header rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// How far a header timestamp may run ahead of the validation clock.
    pub max_future_seconds: i64,
    /// 1990-01-01T00:00:00Z
    pub min_timestamp: u64,
    /// 2038-01-19T03:14:07Z
    pub max_timestamp: u64,
    pub supported_versions: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_future_seconds: 60,
            min_timestamp: 631_152_000,
            max_timestamp: i32::MAX as u64,
            supported_versions: vec!["1.0".into(), "2.0".into(), "3.0".into()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Used when no agency record declares a recognized timezone.
    pub default_timezone: Option<String>,
    pub validator: ValidatorConfig,
}

impl Config {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{path}'"))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config '{path}'"))?;
        Ok(config)
    }

    /// The configured default timezone, UTC if none is set.
    pub fn timezone(&self) -> Result<Tz> {
        match self.default_timezone.as_deref() {
            None => Ok(Tz::UTC),
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| anyhow::anyhow!("Unknown timezone '{name}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"validator": {"max_future_seconds": 5}}"#).unwrap();
        assert_eq!(config.validator.max_future_seconds, 5);
        assert_eq!(config.validator.min_timestamp, 631_152_000);
        assert_eq!(config.validator.supported_versions.len(), 3);
        assert_eq!(config.timezone().unwrap(), Tz::UTC);
    }

    #[test]
    fn test_timezone() {
        let config = Config {
            default_timezone: Some("Europe/Paris".into()),
            ..Default::default()
        };
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Paris);

        let config = Config {
            default_timezone: Some("Nowhere/Special".into()),
            ..Default::default()
        };
        assert!(config.timezone().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = format!("{}/gtfs_rt_consistency_config.json", env::temp_dir().display());
        fs::write(&path, r#"{"default_timezone": "America/Chicago"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_timezone.as_deref(), Some("America/Chicago"));
        assert_eq!(config.validator, ValidatorConfig::default());

        fs::remove_file(&path).unwrap();
        assert!(Config::load(&path).is_err());
    }
}
