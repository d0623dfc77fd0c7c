//! Client configuration loading
//!
//! Base URL resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. `KBSYNC_BASE_URL` environment variable
//! 3. TOML config file (`[client]` table)
//! 4. Compiled default (fallback)
//!
//! A missing or malformed config file never aborts startup; it logs a
//! warning and the defaults apply.

use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const BASE_URL_ENV_VAR: &str = "KBSYNC_BASE_URL";

/// Settings for the synchronization engine
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base path, e.g. `http://127.0.0.1:8000/api/v1`
    pub base_url: String,
    /// Fixed period between poller ticks
    pub poll_interval_ms: u64,
    /// Per-request timeout for the HTTP client
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    client: TomlClientSection,
}

#[derive(Debug, Default, Deserialize)]
struct TomlClientSection {
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Resolve configuration following the documented priority order.
    pub fn resolve(cli_base_url: Option<&str>) -> Self {
        let mut config = match read_config_file() {
            Some(content) => Self::from_toml_str(&content),
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(BASE_URL_ENV_VAR) {
            if !url.is_empty() {
                config.base_url = url;
            }
        }

        if let Some(url) = cli_base_url {
            config.base_url = url.to_string();
        }

        config
    }

    /// Parse a TOML config document, falling back to defaults on error.
    pub fn from_toml_str(content: &str) -> Self {
        let mut config = Self::default();
        match toml::from_str::<TomlConfig>(content) {
            Ok(parsed) => {
                let section = parsed.client;
                if let Some(url) = section.base_url {
                    config.base_url = url;
                }
                if let Some(ms) = section.poll_interval_ms {
                    config.poll_interval_ms = ms;
                }
                if let Some(secs) = section.request_timeout_secs {
                    config.request_timeout_secs = secs;
                }
            }
            Err(e) => {
                tracing::warn!("Malformed config file, using defaults: {}", e);
            }
        }
        config
    }
}

/// Platform config file path (`~/.config/kbsync/config.toml` on Linux,
/// the OS config directory elsewhere)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kbsync").join("config.toml"))
}

fn read_config_file() -> Option<String> {
    let path = config_file_path()?;
    match std::fs::read_to_string(&path) {
        Ok(content) => Some(content),
        Err(_) => None,
    }
}
