use thiserror::Error;

use crate::models::{IntegrationKind, Platform};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed for {url}: {source}")]
    Http { url: String, source: reqwest::Error },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("invalid backend URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("api token cannot be sent as an Authorization header")]
    InvalidToken,
}

/// Publish requests rejected before anything is sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("select at least one platform to publish")]
    NoPlatformsEnabled,
    #[error("{platform} needs the '{integration}' integration to be connected")]
    IntegrationNotConnected { platform: Platform, integration: IntegrationKind },
    #[error("{0} is not a target platform of this session")]
    PlatformNotInSession(Platform),
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}
