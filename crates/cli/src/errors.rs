use forkcompare_core::errors::{CompareError, ConfigLoadError};
use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A repository, reference, account or pull request does not exist or
    /// cannot be read by the actor
    #[error("Not found: {0}")]
    NotFound(String),

    /// The git backend or a store failed
    #[error("Server error: {0}")]
    ServerError(String),

    /// Invalid arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The command was interrupted before it completed
    #[error("Interrupted")]
    Interrupted,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl From<CompareError> for CliError {
    fn from(err: CompareError) -> Self {
        match err {
            CompareError::NotFound(what) => CliError::NotFound(what),
            CompareError::ServerError(message) => CliError::ServerError(message),
        }
    }
}

impl From<ConfigLoadError> for CliError {
    fn from(err: ConfigLoadError) -> Self {
        CliError::ConfigError(err.to_string())
    }
}

impl std::process::Termination for CliError {
    fn report(self) -> std::process::ExitCode {
        match self {
            CliError::ConfigError(_) => std::process::ExitCode::from(2),
            CliError::NotFound(_) => std::process::ExitCode::from(3),
            CliError::ServerError(_) => std::process::ExitCode::from(4),
            CliError::InvalidArguments(_) => std::process::ExitCode::from(5),
            CliError::Interrupted => std::process::ExitCode::from(130),
            CliError::Other(_) => std::process::ExitCode::FAILURE,
        }
    }
}
