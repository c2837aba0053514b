use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const SERVER_URL_ENV: &str = "CONNECTSPHERE_SERVER_URL";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client settings stored in `~/.connectsphere/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_url: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default = "chrono::Utc::now")]
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            dark_mode: false,
            last_updated: chrono::Utc::now(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Reads and writes the `.connectsphere` configuration directory
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Manager for `~/.connectsphere`
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Could not determine home directory")?;
        Ok(Self::in_dir(home_dir.join(".connectsphere")))
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Saved configuration, if any
    pub fn load(&self) -> Result<Option<ClientConfig>> {
        let config_file = self.config_file();
        if !config_file.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&config_file).context("Failed to read config file")?;
        let config: ClientConfig = serde_json::from_str(&json).context("Failed to parse config file")?;
        Ok(Some(config))
    }

    /// Saved configuration, or the defaults when there is none or it is unreadable
    pub fn load_or_default(&self) -> ClientConfig {
        match self.load() {
            Ok(Some(config)) => config,
            Ok(None) => ClientConfig::default(),
            Err(e) => {
                log::warn!("Ignoring config file: {:#}", e);
                ClientConfig::default()
            }
        }
    }

    pub fn save(&self, config: &ClientConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).context("Failed to create .connectsphere directory")?;

        let mut config = config.clone();
        config.last_updated = chrono::Utc::now();
        let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
        fs::write(self.config_file(), json).context("Failed to write config file")?;
        Ok(())
    }

    /// Server URL by precedence: command line, environment, saved config, default
    pub fn resolve_server_url(&self, cli: Option<&str>) -> String {
        let env = std::env::var(SERVER_URL_ENV).ok();
        let saved = self.load_or_default().server_url;
        pick_server_url(cli, env.as_deref(), Some(saved.as_str()))
    }
}

fn pick_server_url(cli: Option<&str>, env: Option<&str>, saved: Option<&str>) -> String {
    [cli, env, saved]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(DEFAULT_SERVER_URL)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_precedence() {
        assert_eq!(
            pick_server_url(Some("http://cli"), Some("http://env"), Some("http://file")),
            "http://cli"
        );
        assert_eq!(pick_server_url(None, Some("http://env"), Some("http://file")), "http://env");
        assert_eq!(pick_server_url(None, Some("  "), Some("http://file/")), "http://file");
        assert_eq!(pick_server_url(None, None, None), DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::in_dir(temp_dir.path().join("nested"));
        assert!(manager.load().unwrap().is_none());

        let config = ClientConfig {
            server_url: "http://example:8080".into(),
            request_timeout_secs: 5,
            dark_mode: true,
            ..ClientConfig::default()
        };
        manager.save(&config).unwrap();

        let loaded = manager.load().unwrap().unwrap();
        assert_eq!(loaded.server_url, "http://example:8080");
        assert_eq!(loaded.request_timeout(), Duration::from_secs(5));
        assert!(loaded.dark_mode);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::in_dir(temp_dir.path());
        fs::write(temp_dir.path().join("config.json"), r#"{"server_url":"http://x"}"#).unwrap();

        let loaded = manager.load().unwrap().unwrap();
        assert_eq!(loaded.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(!loaded.dark_mode);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::in_dir(temp_dir.path());
        fs::write(temp_dir.path().join("config.json"), "not json").unwrap();

        assert!(manager.load().is_err());
        assert_eq!(manager.load_or_default().server_url, DEFAULT_SERVER_URL);
    }
}
