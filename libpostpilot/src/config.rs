//! Configuration management for Postpilot

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Connection settings for the external platform API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_oauth_base")]
    pub oauth_base: String,
    /// Version header sent with every REST call.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Lane cadences and selection windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between publish ticks.
    #[serde(default = "default_lane_interval")]
    pub publish_interval: u64,
    /// Seconds between analytics ticks.
    #[serde(default = "default_lane_interval")]
    pub analytics_interval: u64,
    /// Seconds after which a metrics snapshot counts as stale.
    #[serde(default = "default_metrics_freshness")]
    pub metrics_freshness: i64,
    /// UTC hour of day (0-23) at which the renewal lane runs.
    #[serde(default = "default_renewal_hour")]
    pub renewal_hour: u32,
    /// Credentials expiring within this many days get refreshed.
    #[serde(default = "default_renewal_horizon_days")]
    pub renewal_horizon_days: i64,
}

fn default_api_base() -> String {
    "https://api.linkedin.com".to_string()
}

fn default_oauth_base() -> String {
    "https://www.linkedin.com/oauth/v2".to_string()
}

fn default_api_version() -> String {
    "202506".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_lane_interval() -> u64 {
    60
}

fn default_metrics_freshness() -> i64 {
    3600
}

fn default_renewal_hour() -> u32 {
    3
}

fn default_renewal_horizon_days() -> i64 {
    7
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            oauth_base: default_oauth_base(),
            api_version: default_api_version(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            publish_interval: default_lane_interval(),
            analytics_interval: default_lane_interval(),
            metrics_freshness: default_metrics_freshness(),
            renewal_hour: default_renewal_hour(),
            renewal_horizon_days: default_renewal_horizon_days(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/postpilot/postpilot.db".to_string(),
            },
            platform: PlatformConfig::default(),
            scheduling: SchedulingConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.scheduling.renewal_hour > 23 {
            return Err(ConfigError::InvalidValue {
                field: "scheduling.renewal_hour".to_string(),
                reason: "must be an hour of day (0-23)".to_string(),
            }
            .into());
        }
        if self.scheduling.publish_interval == 0 || self.scheduling.analytics_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduling".to_string(),
                reason: "lane intervals must be at least one second".to_string(),
            }
            .into());
        }
        if self.scheduling.metrics_freshness <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduling.metrics_freshness".to_string(),
                reason: "freshness window must be positive".to_string(),
            }
            .into());
        }
        if self.scheduling.renewal_horizon_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduling.renewal_horizon_days".to_string(),
                reason: "horizon must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("POSTPILOT_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("postpilot").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("postpilot"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.scheduling.publish_interval, 60);
        assert_eq!(config.scheduling.analytics_interval, 60);
        assert_eq!(config.scheduling.metrics_freshness, 3600);
        assert_eq!(config.scheduling.renewal_hour, 3);
        assert_eq!(config.scheduling.renewal_horizon_days, 7);
        assert!(config.platform.client_id.is_empty());
    }

    #[test]
    fn test_load_minimal_config_applies_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[database]
path = "/tmp/postpilot-test.db"
"#,
        );

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.database.path, "/tmp/postpilot-test.db");
        assert_eq!(config.scheduling.publish_interval, 60);
        assert_eq!(config.platform.api_base, "https://api.linkedin.com");
        assert_eq!(config.platform.request_timeout, 30);
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[database]
path = "/tmp/postpilot.db"

[platform]
api_base = "https://api.example.com"
oauth_base = "https://auth.example.com/oauth/v2"
api_version = "202401"
client_id = "cid"
client_secret = "secret"
request_timeout = 10

[scheduling]
publish_interval = 5
analytics_interval = 15
metrics_freshness = 600
renewal_hour = 4
renewal_horizon_days = 3
"#,
        );

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.platform.api_base, "https://api.example.com");
        assert_eq!(config.platform.api_version, "202401");
        assert_eq!(config.scheduling.publish_interval, 5);
        assert_eq!(config.scheduling.analytics_interval, 15);
        assert_eq!(config.scheduling.metrics_freshness, 600);
        assert_eq!(config.scheduling.renewal_hour, 4);
        assert_eq!(config.scheduling.renewal_horizon_days, 3);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/postpilot/config.toml");
        let result = Config::load_from_path(&path);
        assert!(matches!(
            result,
            Err(crate::error::PostpilotError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, "not toml [[[");
        let result = Config::load_from_path(&path);
        assert!(matches!(
            result,
            Err(crate::error::PostpilotError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_invalid_renewal_hour_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[database]
path = "/tmp/postpilot.db"

[scheduling]
renewal_hour = 24
"#,
        );

        let result = Config::load_from_path(&path);
        assert!(matches!(
            result,
            Err(crate::error::PostpilotError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[database]
path = "/tmp/postpilot.db"

[scheduling]
publish_interval = 0
"#,
        );

        assert!(Config::load_from_path(&path).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_config_path_env_override() {
        std::env::set_var("POSTPILOT_CONFIG", "/tmp/custom/postpilot.toml");
        let path = resolve_config_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom/postpilot.toml"));
        std::env::remove_var("POSTPILOT_CONFIG");
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_config_path_default_location() {
        std::env::remove_var("POSTPILOT_CONFIG");
        let path = resolve_config_path().unwrap();
        assert!(path.ends_with("postpilot/config.toml"));
    }
}
