//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/kindlenotes/config.toml)
//! 3. Environment variables (KINDLENOTES_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "KINDLENOTES";

/// Path of the pagination endpoint, relative to the listing page
const NEXT_CHUNK_PATH: &str = "/next_book";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Home page of the service, also the base for relative book URLs
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Page holding the sign-in form
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Relative path of the highlights listing
    #[serde(default = "default_listing_path")]
    pub listing_path: String,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upper bound on pagination requests
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Request timeout in seconds (unset = wait indefinitely)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_url: default_login_url(),
            listing_path: default_listing_path(),
            user_agent: default_user_agent(),
            max_pages: default_max_pages(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (KINDLENOTES_BASE_URL, KINDLENOTES_MAX_PAGES, ...)
    /// 2. Config file (~/.config/kindlenotes/config.toml or KINDLENOTES_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_BASE_URL", ENV_PREFIX)) {
            self.base_url = val;
        }

        if let Ok(val) = std::env::var(format!("{}_LOGIN_URL", ENV_PREFIX)) {
            self.login_url = val;
        }

        if let Ok(val) = std::env::var(format!("{}_USER_AGENT", ENV_PREFIX)) {
            self.user_agent = val;
        }

        if let Ok(val) = std::env::var(format!("{}_MAX_PAGES", ENV_PREFIX)) {
            self.max_pages = val
                .parse()
                .with_context(|| format!("{}_MAX_PAGES is not a number: {}", ENV_PREFIX, val))?;
        }

        // Empty string clears the timeout
        if let Ok(val) = std::env::var(format!("{}_TIMEOUT_SECS", ENV_PREFIX)) {
            self.timeout_secs = if val.is_empty() {
                None
            } else {
                Some(val.parse().with_context(|| {
                    format!("{}_TIMEOUT_SECS is not a number: {}", ENV_PREFIX, val)
                })?)
            };
        }

        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with KINDLENOTES_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kindlenotes")
            .join("config.toml")
    }

    /// Full URL of the highlights listing page
    pub fn listing_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.listing_path)
    }

    /// Full URL of the endpoint that serves the next chunk of the listing
    pub fn next_chunk_url(&self) -> String {
        format!("{}{}", self.listing_url(), NEXT_CHUNK_PATH)
    }

    /// Request timeout, if one is configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_base_url() -> String {
    "https://kindle.amazon.com".to_string()
}

fn default_login_url() -> String {
    "http://kindle.amazon.com/login".to_string()
}

fn default_listing_path() -> String {
    "/your_highlights".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string()
}

fn default_max_pages() -> usize {
    10_000
}
