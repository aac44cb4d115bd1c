use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub draftdesk: DraftdeskConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub guardrail: GuardrailConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

#[derive(Debug, Deserialize)]
pub struct DraftdeskConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DraftdeskConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: default_log_level(),
        }
    }
}

fn default_version() -> u32 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

fn default_timeout() -> String {
    "30s".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AutosaveConfig {
    #[serde(default = "default_quiet_period")]
    pub quiet_period: String,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            quiet_period: default_quiet_period(),
        }
    }
}

fn default_quiet_period() -> String {
    "3s".to_string()
}

#[derive(Debug, Deserialize)]
pub struct GuardrailConfig {
    #[serde(default = "default_max_concurrent_fixes")]
    pub max_concurrent_fixes: u32,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fixes: default_max_concurrent_fixes(),
        }
    }
}

fn default_max_concurrent_fixes() -> u32 {
    4
}

#[derive(Debug, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> String {
    "30s".to_string()
}

impl Config {
    /// Debounce quiet period. Falls back to 3s if unparseable (validated at startup).
    pub fn quiet_period(&self) -> std::time::Duration {
        humantime::parse_duration(&self.autosave.quiet_period).unwrap_or(std::time::Duration::from_secs(3))
    }

    pub fn queue_poll_interval(&self) -> std::time::Duration {
        humantime::parse_duration(&self.queue.poll_interval).unwrap_or(std::time::Duration::from_secs(30))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(ConfigError::ReadFile)
        .context("reading config file")?;
    let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.draftdesk.version != 1 {
        return Err(ConfigError::Validation(format!(
            "unsupported config version {} (this binary supports version 1)",
            config.draftdesk.version
        ))
        .into());
    }

    let base_url = &config.api.base_url;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "api base_url '{base_url}' must start with http:// or https://"
        ))
        .into());
    }

    if let Some(token) = config.api.token.as_deref() {
        if token.is_empty() {
            return Err(ConfigError::Validation("api token must not be empty when set".to_string()).into());
        }
        if !token.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(ConfigError::Validation(
                "api token may only contain visible ASCII characters (no spaces or control characters)".to_string(),
            )
            .into());
        }
    }

    humantime::parse_duration(&config.api.timeout)
        .map_err(|e| ConfigError::Validation(format!("api timeout '{}': {}", config.api.timeout, e)))?;

    let quiet = humantime::parse_duration(&config.autosave.quiet_period).map_err(|e| {
        ConfigError::Validation(format!(
            "autosave quiet_period '{}': {}",
            config.autosave.quiet_period, e
        ))
    })?;
    if quiet.is_zero() {
        return Err(ConfigError::Validation("autosave quiet_period must be greater than zero".to_string()).into());
    }

    let poll = humantime::parse_duration(&config.queue.poll_interval).map_err(|e| {
        ConfigError::Validation(format!("queue poll_interval '{}': {}", config.queue.poll_interval, e))
    })?;
    if poll.is_zero() {
        return Err(ConfigError::Validation("queue poll_interval must be greater than zero".to_string()).into());
    }

    if config.guardrail.max_concurrent_fixes == 0 {
        return Err(ConfigError::Validation("guardrail max_concurrent_fixes must be at least 1".to_string()).into());
    }

    Ok(())
}
