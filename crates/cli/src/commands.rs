use forkcompare_core::CompareService;
use forkcompare_developer_platforms::catalog::StaticCatalog;
use forkcompare_developer_platforms::local_git::LocalGitBackend;
use forkcompare_developer_platforms::models::User;
use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::CliError;

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;

/// Branch comparison between a base repository and a head spec
pub mod compare;
/// Configuration management commands
pub mod config_cmd;
/// Diff and patch of a stored pull request
pub mod pull_diff;

/// The service type every command runs against
pub type LocalCompareService = CompareService<LocalGitBackend, StaticCatalog>;

/// Builds the comparison service from the storage settings.
pub fn build_service(config: &AppConfig) -> Result<LocalCompareService, CliError> {
    debug!(
        repositories_root = ?config.storage.repositories_root,
        catalog = ?config.storage.catalog_path,
        "Building comparison service",
    );

    let catalog = StaticCatalog::load(&config.storage.catalog_path).map_err(|e| {
        CliError::ConfigError(format!(
            "Failed to load catalog {:?}: {}",
            config.storage.catalog_path, e
        ))
    })?;
    let git = LocalGitBackend::new(config.storage.repositories_root.clone());

    Ok(CompareService::with_config(git, catalog, &config.compare))
}

/// Splits `owner/name` into its parts.
pub fn split_repository(full_name: &str) -> Result<(&str, &str), CliError> {
    match full_name.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(CliError::InvalidArguments(format!(
            "Repository must be given as owner/name: {}",
            full_name
        ))),
    }
}

/// Resolves the acting account from the flag or the configured default.
pub async fn resolve_actor(
    service: &LocalCompareService,
    flag: Option<&str>,
    config: &AppConfig,
) -> Result<Option<User>, CliError> {
    let login = flag.or(config.default.actor.as_deref());
    Ok(service.find_actor(login).await?)
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Other(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}
