use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_covers_dir")]
    pub covers_dir: String,

    pub claude_api_key: Option<String>,
    pub image_api_key: Option<String>,

    #[serde(default = "default_image_api_url")]
    pub image_api_url: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u32,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_minutes: u32,

    /// Generated covers older than this are reclaimed by the cleanup task.
    #[serde(default = "default_cover_ttl")]
    pub cover_ttl_hours: u32,

    /// Unbookmarked articles older than this are pruned.
    #[serde(default = "default_article_retention")]
    pub article_retention_days: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Cover jobs poll the provider every 2s, up to this many attempts.
    #[serde(default = "default_poll_attempts")]
    pub cover_poll_attempts: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chainwire");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("news.db").to_string_lossy().to_string()
}

fn default_covers_dir() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chainwire")
        .join("covers");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.to_string_lossy().to_string()
}

fn default_image_api_url() -> String {
    "https://api.wavespeed.ai/api/v2".to_string()
}

fn default_poll_interval() -> u32 {
    15
}

fn default_cleanup_interval() -> u32 {
    60
}

fn default_cover_ttl() -> u32 {
    72
}

fn default_article_retention() -> u32 {
    30
}

fn default_max_page_size() -> u32 {
    100
}

fn default_poll_attempts() -> u32 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            covers_dir: default_covers_dir(),
            claude_api_key: None,
            image_api_key: None,
            image_api_url: default_image_api_url(),
            poll_interval_minutes: default_poll_interval(),
            cleanup_interval_minutes: default_cleanup_interval(),
            cover_ttl_hours: default_cover_ttl(),
            article_retention_days: default_article_retention(),
            max_page_size: default_max_page_size(),
            cover_poll_attempts: default_poll_attempts(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Secrets and deployment knobs can be supplied via environment instead of
    /// being written to the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("CHAINWIRE_CLAUDE_API_KEY") {
            self.claude_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("CHAINWIRE_IMAGE_API_KEY") {
            self.image_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("CHAINWIRE_IMAGE_API_URL") {
            self.image_api_url = url;
        }
        if let Ok(host) = std::env::var("CHAINWIRE_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("CHAINWIRE_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(path) = std::env::var("CHAINWIRE_DB_PATH") {
            self.db_path = path;
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chainwire")
            .join("config.toml")
    }
}
