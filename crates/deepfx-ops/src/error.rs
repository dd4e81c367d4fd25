//! Error types for deep image operations.

use thiserror::Error;

/// Error type for deep image operations.
#[derive(Error, Debug)]
pub enum OpsError {
    /// Error from the deep data model (missing or mistyped channel, bad attribute, ...).
    #[error(transparent)]
    Core(#[from] deepfx_core::Error),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation was given nothing to work on.
    #[error("no input: {0}")]
    NoInput(String),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl OpsError {
    /// Returns `true` for a missing or mistyped channel.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_schema_error())
    }

    /// Returns `true` for invalid parameters or missing camera data.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::Core(e) => e.is_config_error(),
            Self::InvalidParameter(_) | Self::Yaml(_) => true,
            _ => false,
        }
    }
}

/// Result type for deep image operations.
pub type OpsResult<T> = Result<T, OpsError>;
