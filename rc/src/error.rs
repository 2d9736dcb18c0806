//! Crate error types

use thiserror::Error;

/// Problems with a loaded configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("activity end-delay-ms must be greater than zero")]
    ZeroEndDelay,

    #[error("activity end-delay-ms ({end_delay_ms}) must be shorter than max-duration-ms ({max_duration_ms})")]
    WindowTooShort { end_delay_ms: u64, max_duration_ms: u64 },

    #[error("Invalid intake URL '{url}': {source}")]
    InvalidIntakeUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Problems with a replay scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Step {index} at {at_ms}ms comes before the previous step at {previous_ms}ms")]
    OutOfOrder { index: usize, at_ms: u64, previous_ms: u64 },

    #[error("Step {index}: {message}")]
    InvalidStep { index: usize, message: String },
}
