//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `DROWSY__`-prefixed environment variables
//! (e.g. `DROWSY__DMS__YAWN_THRESHOLD=4`).

use camera_capture::CameraConfig;
use dms::DmsConfig;
use inference_engine::OnnxConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE: &str = "drowsiness-monitor.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DROWSY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub log_dir: PathBuf,
    pub report_dir: PathBuf,
    pub settings_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            report_dir: PathBuf::from("reports"),
            settings_path: PathBuf::from("user_settings.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Messaging webhook; messages are only logged when unset
    pub webhook_url: Option<String>,
    pub webhook_timeout_s: u64,
    /// Attach an approximate IP location to emergency messages
    pub geolocation: bool,
    pub geolocation_url: String,
    pub geolocation_timeout_s: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_s: 15,
            geolocation: true,
            geolocation_url: alerting::IPINFO_URL.to_string(),
            geolocation_timeout_s: 3,
        }
    }
}

/// Top-level configuration of the `drowsiness-monitor` binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub camera: CameraConfig,
    pub model: OnnxConfig,
    pub dms: DmsConfig,
    pub storage: StorageConfig,
    pub notifier: NotifierConfig,
}

impl AppConfig {
    /// Load defaults, then `path` if it exists, then the environment
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.dms.yawn_threshold, 5);
        assert_eq!(config.dms.gate.active_window_min, 15);
        assert!(config.notifier.webhook_url.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[dms]\ndrowsy_alert_threshold_s = 4.5\n\n[dms.gate]\nenabled = false\n\n[camera]\ntick_ms = 50"
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.dms.drowsy_alert_threshold_s, 4.5);
        assert!(!config.dms.gate.enabled);
        assert_eq!(config.dms.gate.emergency_threshold_s, 25.0);
        assert_eq!(config.camera.tick_ms, 50);
        assert_eq!(config.camera.width, 640);
    }
}
