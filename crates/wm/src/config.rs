//! Runtime configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long a transaction waits for configure acks before committing
    /// with whatever arrived (milliseconds)
    pub transaction_timeout_ms: u64,

    /// Override for the control socket path (default: runtime dir)
    pub socket: Option<PathBuf>,

    /// Keyboard configuration
    pub keyboard: KeyboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: 100,
            socket: None,
            keyboard: KeyboardConfig::default(),
        }
    }
}

/// Keyboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// XKB layout
    pub layout: String,

    /// XKB variant
    pub variant: String,

    /// XKB options
    pub options: String,

    /// Key repeat delay (ms)
    pub repeat_delay: u32,

    /// Key repeat rate (keys per second)
    pub repeat_rate: u32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            layout: String::new(),
            variant: String::new(),
            options: String::new(),
            repeat_delay: 400,
            repeat_rate: 25,
        }
    }
}

impl Config {
    /// Load configuration from the first existing config file, falling back
    /// to defaults.
    pub fn load() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tidewm/config.toml")),
            Some(PathBuf::from("/etc/tidewm/config.toml")),
        ];

        for path in config_paths.into_iter().flatten() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match toml::from_str::<Config>(&content) {
                        Ok(config) => {
                            tracing::info!(?path, "loaded configuration");
                            return config;
                        }
                        Err(e) => {
                            tracing::warn!(?path, error = %e, "failed to parse config");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(?path, error = %e, "failed to read config");
                    }
                }
            }
        }

        tracing::info!("using default configuration");
        Self::default()
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.transaction_timeout(), Duration::from_millis(100));
        assert!(config.socket.is_none());
        assert_eq!(config.keyboard.repeat_delay, 400);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: Config = toml::from_str("transaction_timeout_ms = 250").unwrap();
        assert_eq!(config.transaction_timeout(), Duration::from_millis(250));
        assert_eq!(config.keyboard.repeat_rate, 25);
    }

    #[test]
    fn keyboard_section_parses() {
        let config: Config = toml::from_str(
            r#"
            [keyboard]
            layout = "de"
            repeat_delay = 300
            "#,
        )
        .unwrap();
        assert_eq!(config.keyboard.layout, "de");
        assert_eq!(config.keyboard.repeat_delay, 300);
        assert_eq!(config.keyboard.repeat_rate, 25);
    }
}
