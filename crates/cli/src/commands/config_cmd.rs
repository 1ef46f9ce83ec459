use clap::Subcommand;
use tracing::debug;

use crate::config::{get_config_path, AppConfig};
use crate::errors::CliError;

#[cfg(test)]
#[path = "config_cmd_tests.rs"]
mod tests;

/// Subcommands for the config command
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Create initial configuration file
    Init {
        /// Path to save the configuration file
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Check configuration syntax and limits
    Validate {
        /// Path to the configuration file
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Show current configuration
    #[command(alias = "get")]
    Show {
        /// Path to the configuration file
        #[arg(short, long)]
        path: Option<String>,

        /// Configuration key to get (e.g., "compare.limits.maxPageSize")
        key: Option<String>,
    },

    /// Update configuration values
    Set {
        /// Path to the configuration file
        #[arg(short, long)]
        path: Option<String>,

        /// Configuration key to set (e.g., "default.actor")
        key: String,

        /// Value to set
        value: String,
    },
}

/// Execute the config command
pub async fn execute(cmd: ConfigCommands) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Init { path } => init_config(path.as_deref()),
        ConfigCommands::Validate { path } => validate_config(path.as_deref()),
        ConfigCommands::Show { path, key } => show_config(path.as_deref(), key.as_deref()),
        ConfigCommands::Set { path, key, value } => set_config(path.as_deref(), &key, &value),
    }
}

/// Initialize a new configuration file
fn init_config(path: Option<&str>) -> Result<(), CliError> {
    let config_path = get_config_path(path);
    debug!("Initializing configuration at {:?}", config_path);

    if config_path.exists() {
        return Err(CliError::ConfigError(format!(
            "Configuration file already exists at {:?}",
            config_path
        )));
    }

    AppConfig::default().save(&config_path)?;

    println!("Configuration initialized at {:?}", config_path);
    Ok(())
}

/// Validate a configuration file
fn validate_config(path: Option<&str>) -> Result<(), CliError> {
    let config_path = get_config_path(path);
    debug!("Validating configuration at {:?}", config_path);

    AppConfig::load(&config_path)?;
    println!("Configuration is valid");
    Ok(())
}

/// Show the whole configuration or a single value
fn show_config(path: Option<&str>, key: Option<&str>) -> Result<(), CliError> {
    let config_path = get_config_path(path);
    debug!("Getting configuration from {:?}", config_path);

    let config = AppConfig::load(&config_path)?;

    if let Some(key) = key {
        let value = get_config_value(&config, key)?;
        println!("{}: {}", key, value);
    } else {
        let config_str = toml::to_string_pretty(&config).map_err(|e| {
            CliError::ConfigError(format!("Failed to serialize configuration: {}", e))
        })?;
        println!("{}", config_str);
    }

    Ok(())
}

/// Set a configuration value
fn set_config(path: Option<&str>, key: &str, value: &str) -> Result<(), CliError> {
    let config_path = get_config_path(path);
    debug!("Setting configuration at {:?}", config_path);

    let mut config = if config_path.exists() {
        AppConfig::load(&config_path)?
    } else {
        AppConfig::default()
    };

    set_config_value(&mut config, key, value)?;
    config.compare.validate()?;
    config.save(&config_path)?;

    println!("Configuration updated: {} = {}", key, value);
    Ok(())
}

fn invalid_key(key: &str) -> CliError {
    CliError::InvalidArguments(format!("Invalid configuration key: {}", key))
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CliError> {
    value
        .parse()
        .map_err(|_| CliError::InvalidArguments(format!("Invalid value for {}: {}", key, value)))
}

/// Get a value from the configuration by key path
fn get_config_value(config: &AppConfig, key: &str) -> Result<String, CliError> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["storage", "repositories_root"] => {
            Ok(config.storage.repositories_root.display().to_string())
        }
        ["storage", "catalog_path"] => Ok(config.storage.catalog_path.display().to_string()),
        ["default", "actor"] => Ok(config.default.actor.clone().unwrap_or_default()),
        ["compare", "appUrl"] => Ok(config.compare.app_url.clone()),
        ["compare", "limits", "maxPageSize"] => Ok(config.compare.limits.max_page_size.to_string()),
        ["compare", "limits", "maxDiffBytes"] => {
            Ok(config.compare.limits.max_diff_bytes.to_string())
        }
        ["compare", "limits", "maxPatchBytes"] => {
            Ok(config.compare.limits.max_patch_bytes.to_string())
        }
        _ => Err(invalid_key(key)),
    }
}

/// Set a value in the configuration by key path
fn set_config_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), CliError> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["storage", "repositories_root"] => config.storage.repositories_root = value.into(),
        ["storage", "catalog_path"] => config.storage.catalog_path = value.into(),
        ["default", "actor"] => {
            config.default.actor = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
        ["compare", "appUrl"] => config.compare.app_url = value.to_string(),
        ["compare", "limits", "maxPageSize"] => {
            config.compare.limits.max_page_size = parse_value(key, value)?
        }
        ["compare", "limits", "maxDiffBytes"] => {
            config.compare.limits.max_diff_bytes = parse_value(key, value)?
        }
        ["compare", "limits", "maxPatchBytes"] => {
            config.compare.limits.max_patch_bytes = parse_value(key, value)?
        }
        _ => return Err(invalid_key(key)),
    }

    Ok(())
}
