use serde::{Deserialize, Serialize};

use crate::common::types::AnyResult;
use crate::configs::{LoggingConfig, PlayerConfig, StorageConfig};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub player: PlayerConfig,
}

impl Config {
    pub fn load() -> AnyResult<Self> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err("config.toml or config.default.toml not found".into());
        };

        tracing::info!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        if config_str.is_empty() {
            return Err(format!("{} is empty", config_path).into());
        }

        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.player.min_repeat_interval, 32);
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let raw = r#"
            [storage]
            data_dir = "/var/lib/tunelink"

            [logging]
            level = "debug"

            [player]
            min_repeat_interval = 16
            max_queue_length = 500
        "#;
        let config: Config = toml::from_str(raw).expect("config should parse");
        assert_eq!(
            config.storage.data_dir,
            std::path::PathBuf::from("/var/lib/tunelink")
        );
        assert_eq!(config.logging.unwrap().level.as_deref(), Some("debug"));
        assert_eq!(config.player.min_repeat_interval, 16);
        assert_eq!(config.player.max_queue_length, Some(500));
    }
}
