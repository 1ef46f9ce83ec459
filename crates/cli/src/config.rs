use std::{
    fs,
    path::{Path, PathBuf},
};

use forkcompare_core::config::ForkCompareConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::CliError;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILENAME: &str = ".forkcompare.toml";

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Configuration for the forkcompare CLI
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where repositories and their records live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Default settings
    #[serde(default)]
    pub default: DefaultConfig,

    /// Limits applied to every comparison
    #[serde(default)]
    pub compare: ForkCompareConfig,
}

impl AppConfig {
    /// Load configuration from the specified file
    pub fn load(path: &Path) -> Result<Self, CliError> {
        debug!("Loading configuration from {:?}", path);

        if !path.exists() {
            return Err(CliError::ConfigError(format!(
                "Configuration file not found: {:?}",
                path
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            CliError::ConfigError(format!("Failed to read configuration file: {}", e))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            CliError::ConfigError(format!("Failed to parse configuration file: {}", e))
        })?;
        config.compare.validate()?;

        Ok(config)
    }

    /// Save configuration to the specified file
    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        debug!("Saving configuration to {:?}", path);

        let content = toml::to_string_pretty(self).map_err(|e| {
            CliError::ConfigError(format!("Failed to serialize configuration: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CliError::ConfigError(format!("Failed to create directory: {}", e))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            CliError::ConfigError(format!("Failed to write configuration file: {}", e))
        })?;

        info!("Configuration saved to {:?}", path);
        Ok(())
    }
}

/// Locations of the bare repositories and the catalog file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `<owner>/<name>.git` bare repositories
    #[serde(default = "StorageConfig::default_repositories_root")]
    pub repositories_root: PathBuf,

    /// TOML file with accounts, repositories, collaborators and pull requests
    #[serde(default = "StorageConfig::default_catalog_path")]
    pub catalog_path: PathBuf,
}

impl StorageConfig {
    fn default_repositories_root() -> PathBuf {
        PathBuf::from("repositories")
    }

    fn default_catalog_path() -> PathBuf {
        PathBuf::from("catalog.toml")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            repositories_root: StorageConfig::default_repositories_root(),
            catalog_path: StorageConfig::default_catalog_path(),
        }
    }
}

/// Default configuration settings
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Login used when a command is run without `--actor`; anonymous if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

/// Get the path to the configuration file
pub fn get_config_path(config_path: Option<&str>) -> PathBuf {
    if let Some(path) = config_path {
        PathBuf::from(path)
    } else {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        current_dir.join(DEFAULT_CONFIG_FILENAME)
    }
}
