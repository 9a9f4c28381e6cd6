use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reminders::ReminderSetting;

const ENV_PREFIX: &str = "WORKFLOWGO_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime configuration for the realtime client.
///
/// Every field has a default so a partial JSON document or a bare
/// environment still yields a usable config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default)]
    pub reminder_setting: ReminderSetting,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    "http://localhost:8081".to_string()
}
fn default_ws_base_url() -> String {
    "ws://localhost:8081/api".to_string()
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_reconnect_base_delay_ms() -> u64 {
    5_000
}
fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_heartbeat_ms() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ws_base_url: default_ws_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_ms: default_heartbeat_ms(),
            reminder_setting: ReminderSetting::default(),
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load `.env` (if any) and overlay `WORKFLOWGO_*` variables on the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("failed to load .env file: {e}");
            }
        }
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Build a config from an arbitrary key lookup. Keys are given without
    /// the `WORKFLOWGO_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = get("API_URL") {
            config.api_base_url = value;
        }
        if let Some(value) = get("WS_URL") {
            config.ws_base_url = value;
        }
        if let Some(value) = get("REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("RECONNECT_BASE_DELAY_MS") {
            config.reconnect_base_delay_ms = parse_number("RECONNECT_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = get("RECONNECT_MAX_DELAY_MS") {
            config.reconnect_max_delay_ms = parse_number("RECONNECT_MAX_DELAY_MS", &value)?;
        }
        if let Some(value) = get("MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = parse_number("MAX_RECONNECT_ATTEMPTS", &value)?;
        }
        if let Some(value) = get("HEARTBEAT_MS") {
            config.heartbeat_ms = parse_number("HEARTBEAT_MS", &value)?;
        }
        if let Some(value) = get("REMINDER_TIME") {
            config.reminder_setting = ReminderSetting::parse_or_default(&value);
        }
        if let Some(value) = get("DATA_DIR") {
            config.data_dir = Some(PathBuf::from(value));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "api_base_url",
                reason: "cannot be empty".to_string(),
            });
        }
        if self.ws_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "ws_base_url",
                reason: "cannot be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.reconnect_max_delay_ms < self.reconnect_base_delay_ms {
            return Err(ConfigError::Invalid {
                key: "reconnect_max_delay_ms",
                reason: "must not be smaller than reconnect_base_delay_ms".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    /// REST root, always ending in `/api` without a trailing slash.
    pub fn api_root(&self) -> String {
        format!("{}/api", self.api_base_url.trim_end_matches('/'))
    }

    /// Directory holding `session.json`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".workflowgo");
        }
        if let Ok(home) = std::env::var("USERPROFILE") {
            return PathBuf::from(home).join(".workflowgo");
        }
        PathBuf::from(".workflowgo")
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("'{value}': {e}"),
    })
}
