//! Configuration settings for the comparison core.
//!
//! This module centralizes the limits that bound a single comparison request
//! and the settings file they can be loaded from.
use forkcompare_developer_platforms::models::ListOptions;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::ConfigLoadError;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Base URL used for commit links when none is configured
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";

/// Maximum number of diff text bytes returned in one response
pub const DEFAULT_MAX_DIFF_BYTES: usize = 1024 * 1024;

/// Maximum number of commits returned in one page
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 50;

/// Maximum number of patch text bytes returned in one response
pub const DEFAULT_MAX_PATCH_BYTES: usize = 1024 * 1024;

/// Separator between the base ref and the head spec of a compare path
pub const COMPARE_SEPARATOR: &str = "...";

/// Namespace prefix of branch refs
pub const BRANCH_PREFIX: &str = "refs/heads/";

/// Namespace prefix of tag refs
pub const TAG_PREFIX: &str = "refs/tags/";

lazy_static! {
    /// Pre-compiled regex for full SHA-1 or SHA-256 commit ids
    pub static ref FULL_COMMIT_ID_REGEX: Regex = Regex::new(r"^(?:[0-9a-fA-F]{40}|[0-9a-fA-F]{64})$")
        .expect("Failed to compile full commit id regex");

    /// Pre-compiled regex for abbreviated commit ids
    pub static ref SHORT_COMMIT_ID_REGEX: Regex = Regex::new(r"^[0-9a-fA-F]{4,63}$")
        .expect("Failed to compile short commit id regex");
}

/// Pagination as requested by a caller, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRequest {
    /// 1-based page number; values below 1 select the first page
    pub page: i64,

    /// Requested page size; values below 1 or above the maximum select the maximum
    pub page_size: i64,
}

/// Runtime limits applied to every comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareLimits {
    pub max_page_size: u32,
    pub max_diff_bytes: usize,
    pub max_patch_bytes: usize,
}

impl Default for CompareLimits {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            max_diff_bytes: DEFAULT_MAX_DIFF_BYTES,
            max_patch_bytes: DEFAULT_MAX_PATCH_BYTES,
        }
    }
}

impl CompareLimits {
    /// Normalizes a page request instead of rejecting it.
    ///
    /// # Examples
    ///
    /// ```
    /// use forkcompare_core::config::{CompareLimits, PageRequest};
    ///
    /// let limits = CompareLimits::default();
    /// let options = limits.normalize(PageRequest { page: 0, page_size: 500 });
    /// assert_eq!(options.page, 1);
    /// assert_eq!(options.page_size, 50);
    /// ```
    pub fn normalize(&self, request: PageRequest) -> ListOptions {
        let page = request.page.clamp(1, u32::MAX as i64) as u32;
        let page_size = if request.page_size <= 0 || request.page_size > self.max_page_size as i64 {
            self.max_page_size
        } else {
            request.page_size as u32
        };

        ListOptions { page, page_size }
    }
}

/// Top-level limits settings of a forkcompare configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForkCompareConfig {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,

    #[serde(default)]
    pub limits: LimitsConfig,

    /// Base URL commit links are built from
    #[serde(default = "default_app_url", rename = "appUrl")]
    pub app_url: String,
}

impl Default for ForkCompareConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            limits: LimitsConfig::default(),
            app_url: default_app_url(),
        }
    }
}

impl ForkCompareConfig {
    /// Converts the file settings into the limits used at runtime.
    pub fn to_compare_limits(&self) -> CompareLimits {
        CompareLimits {
            max_page_size: self.limits.max_page_size,
            max_diff_bytes: self.limits.max_diff_bytes,
            max_patch_bytes: self.limits.max_patch_bytes,
        }
    }

    /// Checks values that deserialize but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.schema_version != 1 {
            return Err(ConfigLoadError::UnsupportedSchemaVersion(
                self.schema_version,
            ));
        }
        if self.limits.max_page_size == 0 {
            return Err(ConfigLoadError::InvalidValue(
                "limits.maxPageSize must be at least 1".to_string(),
            ));
        }
        if self.limits.max_diff_bytes == 0 {
            return Err(ConfigLoadError::InvalidValue(
                "limits.maxDiffBytes must be at least 1".to_string(),
            ));
        }
        if self.limits.max_patch_bytes == 0 {
            return Err(ConfigLoadError::InvalidValue(
                "limits.maxPatchBytes must be at least 1".to_string(),
            ));
        }
        if self.app_url.trim().is_empty() {
            return Err(ConfigLoadError::InvalidValue(
                "appUrl must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Limits section of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitsConfig {
    #[serde(default = "default_max_page_size", rename = "maxPageSize")]
    pub max_page_size: u32,

    #[serde(default = "default_max_diff_bytes", rename = "maxDiffBytes")]
    pub max_diff_bytes: usize,

    #[serde(default = "default_max_patch_bytes", rename = "maxPatchBytes")]
    pub max_patch_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            max_diff_bytes: DEFAULT_MAX_DIFF_BYTES,
            max_patch_bytes: DEFAULT_MAX_PATCH_BYTES,
        }
    }
}

fn default_app_url() -> String {
    DEFAULT_APP_URL.to_string()
}

fn default_max_diff_bytes() -> usize {
    DEFAULT_MAX_DIFF_BYTES
}

fn default_max_page_size() -> u32 {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_max_patch_bytes() -> usize {
    DEFAULT_MAX_PATCH_BYTES
}

/// Load and validate a forkcompare configuration file from disk.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(ForkCompareConfig)` if the file is valid
/// * `Err(ConfigLoadError)` if there is a problem
pub fn load_forkcompare_config<P: AsRef<Path>>(
    path: P,
) -> Result<ForkCompareConfig, ConfigLoadError> {
    let path_ref = path.as_ref();
    let content = match fs::read_to_string(path_ref) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigLoadError::NotFound(path_ref.display().to_string()));
        }
        Err(e) => return Err(ConfigLoadError::Io(e)),
    };
    let config: ForkCompareConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
