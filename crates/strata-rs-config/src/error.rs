//! Config errors.

use thiserror::Error;

/// Errors returned while loading, validating, or resolving Strata config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config layer could not be read.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A config layer is not valid JSON5.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged value does not decode into `StrataConfig`.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A field is unknown or has the wrong shape.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// A cross-field rule failed.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// No home directory to anchor default paths.
    #[error("unable to resolve home directory for {0}")]
    NoHomeDir(&'static str),
}
