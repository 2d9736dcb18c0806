//! rumcore configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::activity::PageActivityConfig;
use crate::collaborators::{Configuration, StaticSession};
use crate::error::ConfigError;

/// Default cap on the response body kept in network error stacks
pub const DEFAULT_REQUEST_ERROR_RESPONSE_LENGTH_LIMIT: usize = 32 * 1024;

/// Main rumcore configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL prefixes of the collector; requests to them are never reported
    #[serde(rename = "intake-urls")]
    pub intake_urls: Vec<String>,

    /// Feature flags turned on for this page
    #[serde(rename = "enabled-features")]
    pub enabled_features: Vec<String>,

    /// Characters of response body kept in network error stacks (null for unlimited)
    #[serde(rename = "request-error-response-length-limit")]
    pub request_error_response_length_limit: Option<usize>,

    /// Idle activity window timing
    pub activity: ActivityConfig,

    /// Sampling decision for the session
    pub session: SessionConfig,

    /// Log level for the replay binary
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            intake_urls: vec!["https://browser-intake-datadoghq.com".to_string()],
            enabled_features: Vec::new(),
            request_error_response_length_limit: Some(DEFAULT_REQUEST_ERROR_RESPONSE_LENGTH_LIMIT),
            activity: ActivityConfig::default(),
            session: SessionConfig::default(),
            log_level: None,
        }
    }
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        self.activity.validate()?;
        for prefix in &self.intake_urls {
            Url::parse(prefix).map_err(|source| ConfigError::InvalidIntakeUrl {
                url: prefix.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .rumcore.yml
        let local_config = PathBuf::from(".rumcore.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/rumcore/rumcore.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rumcore").join("rumcore.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from the config file, read before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn page_activity(&self) -> PageActivityConfig {
        self.activity.to_page_activity_config()
    }

    pub fn static_session(&self) -> StaticSession {
        StaticSession {
            tracked: self.session.tracked,
            tracked_with_resource: self.session.tracked_with_resource,
        }
    }
}

impl Configuration for Config {
    fn is_intake_url(&self, url: &str) -> bool {
        self.intake_urls.iter().any(|prefix| url.starts_with(prefix.as_str()))
    }

    fn is_enabled(&self, feature: &str) -> bool {
        self.enabled_features.iter().any(|enabled| enabled == feature)
    }

    fn request_error_response_length_limit(&self) -> Option<usize> {
        self.request_error_response_length_limit
    }
}

/// Idle activity window timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Quiet period after the last activity that ends a window
    #[serde(rename = "end-delay-ms")]
    pub end_delay_ms: u64,

    /// Hard cap on a window
    #[serde(rename = "max-duration-ms")]
    pub max_duration_ms: u64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            end_delay_ms: 100,
            max_duration_ms: 10_000,
        }
    }
}

impl ActivityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_delay_ms == 0 {
            return Err(ConfigError::ZeroEndDelay);
        }
        if self.end_delay_ms >= self.max_duration_ms {
            return Err(ConfigError::WindowTooShort {
                end_delay_ms: self.end_delay_ms,
                max_duration_ms: self.max_duration_ms,
            });
        }
        Ok(())
    }

    pub fn to_page_activity_config(&self) -> PageActivityConfig {
        PageActivityConfig {
            end_delay: Duration::from_millis(self.end_delay_ms),
            max_duration: Duration::from_millis(self.max_duration_ms),
        }
    }
}

/// Sampling decision applied to the whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tracked: bool,

    #[serde(rename = "tracked-with-resource")]
    pub tracked_with_resource: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracked: true,
            tracked_with_resource: true,
        }
    }
}
