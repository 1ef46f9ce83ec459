use forkcompare_developer_platforms::errors::Error as PlatformError;
use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Request-level failures of a comparison.
///
/// Every existence and permission failure collapses into `NotFound` so that
/// callers cannot tell an inaccessible repository from a missing one.
/// Expected outcomes such as "nothing to compare" are data on the result,
/// never errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompareError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

impl CompareError {
    /// The generic not-found error returned when a permission check fails.
    pub fn access_denied() -> Self {
        CompareError::NotFound("repository or reference".to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CompareError::NotFound(_))
    }
}

impl From<PlatformError> for CompareError {
    fn from(err: PlatformError) -> Self {
        if err.is_not_found() {
            CompareError::NotFound(err.to_string())
        } else {
            CompareError::ServerError(err.to_string())
        }
    }
}

/// Failures while loading a [`crate::config::ForkCompareConfig`] file.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported configuration schema version: {0}")]
    UnsupportedSchemaVersion(u32),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
