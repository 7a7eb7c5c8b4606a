//! Configuration module for the device lab
//!
//! Reads/writes configuration from ~/.config/rmcp-devicelab/devicelab.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::notifications::{Importance, NotificationChannel};
use crate::sensors::{SamplingRate, SensorKind};

/// Device lab configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tool names to hide from clients
    pub disabled: Vec<String>,
    pub datastore: DatastoreConfig,
    pub network: NetworkConfig,
    pub sensors: SensorsConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Store name, used as the file stem of the preferences file
    pub name: String,
    /// Key of the persisted counter inside the store
    pub counter_key: String,
    /// Directory holding the store (defaults to the platform data dir)
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub base_url: String,
    /// Request timeout in seconds; 0 disables it
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub default_kind: SensorKind,
    pub sampling: SamplingRate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub channel_id: String,
    pub channel_name: String,
    pub channel_description: String,
    pub importance: Importance,
    pub title: String,
    pub body: String,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            name: "settings".to_string(),
            counter_key: "example_counter".to_string(),
            directory: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://172.24.224.1:8000".to_string(),
            timeout_secs: Some(10),
        }
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            default_kind: SensorKind::Accelerometer,
            sampling: SamplingRate::Normal,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channel_id: "devicelab".to_string(),
            channel_name: "Device lab".to_string(),
            channel_description: "Notifications posted from the device lab".to_string(),
            importance: Importance::Default,
            title: "Device lab".to_string(),
            body: "Hello from the device lab".to_string(),
        }
    }
}

impl DatastoreConfig {
    /// Directory the store lives in, falling back to the platform data dir
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        self.directory
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("rmcp-devicelab")))
    }
}

impl NotificationsConfig {
    pub fn channel(&self) -> NotificationChannel {
        NotificationChannel {
            id: self.channel_id.clone(),
            name: self.channel_name.clone(),
            description: self.channel_description.clone(),
            importance: self.importance,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rmcp-devicelab").join("devicelab.toml"))
    }

    /// Load config from the default location, or return default if not found
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            tracing::warn!("Could not determine config directory, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load config from an explicit file, or return default if not usable
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::error!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!("Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.datastore.name, "settings");
        assert_eq!(config.datastore.counter_key, "example_counter");
        assert_eq!(config.network.base_url, "http://172.24.224.1:8000");
        assert_eq!(config.network.timeout_secs, Some(10));
        assert_eq!(config.sensors.default_kind, SensorKind::Accelerometer);
        assert_eq!(config.sensors.sampling, SamplingRate::Normal);
        assert_eq!(config.notifications.importance, Importance::Default);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [network]
            base_url = "http://localhost:9000/api/"
            timeout_secs = 5

            [sensors]
            default_kind = "gyroscope"
            sampling = "game"
            "#,
        )
        .unwrap();

        assert_eq!(config.network.base_url, "http://localhost:9000/api/");
        assert_eq!(config.network.timeout_secs, Some(5));
        assert_eq!(config.sensors.default_kind, SensorKind::Gyroscope);
        assert_eq!(config.sensors.sampling, SamplingRate::Game);
        assert_eq!(config.datastore.counter_key, "example_counter");
        assert_eq!(config.notifications.channel_id, "devicelab");
    }

    #[test]
    fn test_save_then_load_from() {
        let dir = std::env::temp_dir().join(format!("devicelab-config-{}", std::process::id()));
        let path = dir.join("devicelab.toml");

        let mut config = Config::default();
        config.datastore.counter_key = "clicks".to_string();
        config.notifications.importance = Importance::High;
        config.save(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.datastore.counter_key, "clicks");
        assert_eq!(loaded.notifications.importance, Importance::High);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unparsable_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("devicelab-badcfg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("devicelab.toml");
        fs::write(&path, "[network\nbase_url = ").unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.network.base_url, NetworkConfig::default().base_url);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_template_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../devicelab.toml.example")).unwrap();
        assert!(config.disabled.is_empty());
        assert_eq!(config.datastore.name, "settings");
        assert_eq!(config.datastore.directory, None);
        assert_eq!(config.network.base_url, NetworkConfig::default().base_url);
        assert_eq!(config.network.timeout_secs, Some(10));
        assert_eq!(config.sensors.sampling, SamplingRate::Normal);
        assert_eq!(config.notifications.body, "Hello from the device lab");
    }

    #[test]
    fn test_disabled_tools() {
        let config: Config = toml::from_str(r#"disabled = ["fetch_data"]"#).unwrap();
        assert_eq!(config.disabled, vec!["fetch_data".to_string()]);
    }

    #[test]
    fn test_channel_from_config() {
        let channel = NotificationsConfig::default().channel();
        assert_eq!(channel.id, "devicelab");
        assert_eq!(channel.name, "Device lab");
        assert_eq!(channel.importance, Importance::Default);
    }
}
