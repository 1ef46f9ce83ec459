//! # Models
//!
//! This module contains the data models shared between the collaborators and
//! the comparison core.
//!
//! These models represent platform accounts, repositories and their fork
//! lineage, permissions, low-level git commits and stored pull requests.
//! They are serializable so that catalog files and API responses can be
//! produced from them directly.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// Level of access an actor holds on a repository.
///
/// The variants are ordered so that comparisons such as
/// `mode >= AccessMode::Read` express "at least read access".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// No access at all
    #[default]
    None,
    /// Read-only access
    Read,
    /// Read and push access
    Write,
    /// Repository administration
    Admin,
    /// Repository owner
    Owner,
}

/// Result of a comparison walk between two refs.
///
/// `commits` holds the requested page of the range `(merge_base, head]`,
/// most recent first. `total_commits` counts the whole range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareInfo {
    /// The most recent common ancestor of the two refs
    pub merge_base: String,

    /// The commits in the requested page window, newest first
    pub commits: Vec<Commit>,

    /// Number of commits in the complete range
    pub total_commits: u64,

    /// Number of files changed between the merge base and the head
    pub num_files: u64,
}

/// A git commit as read from the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit id
    pub id: String,

    /// Who wrote the change
    pub author: Signature,

    /// Who recorded the commit
    pub committer: Signature,

    /// The full commit message
    pub message: String,

    /// Id of the root tree of the commit
    pub tree_id: String,

    /// Parent commit ids in the order git declares them
    pub parent_ids: Vec<String>,
}

/// Page window for commit enumeration.
///
/// `page` is 1-based. Values handed to a backend are expected to be
/// normalized already.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// 1-based page number
    pub page: u32,

    /// Number of items per page
    pub page_size: u32,
}

impl ListOptions {
    /// Number of items preceding the page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.page_size as usize)
    }
}

/// A pull request record as stored by the persistence collaborator.
///
/// # Examples
///
/// ```
/// use forkcompare_developer_platforms::models::PullRequest;
///
/// let pr = PullRequest {
///     id: 10,
///     index: 3,
///     title: "Add feature".to_string(),
///     base_repo_id: 1,
///     base_branch: "main".to_string(),
///     head_repo_id: 2,
///     head_branch: "feature".to_string(),
///     merge_base: "b".repeat(40),
///     has_merged: false,
/// };
/// assert!(!pr.is_same_repo());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Unique id of the pull request
    pub id: u64,

    /// Per-repository pull request number
    pub index: u64,

    /// Title of the pull request
    #[serde(default)]
    pub title: String,

    /// Repository the pull request merges into
    pub base_repo_id: u64,

    /// Branch the pull request merges into
    pub base_branch: String,

    /// Repository the changes come from
    pub head_repo_id: u64,

    /// Branch the changes come from
    pub head_branch: String,

    /// Merge base recorded when the pull request was last updated
    pub merge_base: String,

    /// Whether the pull request has been merged
    #[serde(default)]
    pub has_merged: bool,
}

impl PullRequest {
    /// Returns `true` when head and base live in the same repository.
    pub fn is_same_repo(&self) -> bool {
        self.base_repo_id == self.head_repo_id
    }
}

/// Kind of raw text produced for a commit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDiffKind {
    /// Unified diff between two trees
    Diff,
    /// Mailbox formatted patches, one per commit
    Patch,
}

/// Permissions an actor holds on a single repository.
///
/// # Examples
///
/// ```
/// use forkcompare_developer_platforms::models::{AccessMode, RepoPermission, UnitType};
///
/// let permission = RepoPermission {
///     access_mode: AccessMode::Read,
///     units: vec![UnitType::Code],
/// };
/// assert!(permission.can_read(UnitType::Code));
/// assert!(!permission.can_read_issues_or_pulls(true));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepoPermission {
    /// Overall access level
    pub access_mode: AccessMode,

    /// Units the access level applies to
    #[serde(default)]
    pub units: Vec<UnitType>,
}

impl RepoPermission {
    /// A permission that grants nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Full access to every unit.
    pub fn owner() -> Self {
        Self {
            access_mode: AccessMode::Owner,
            units: UnitType::all().to_vec(),
        }
    }

    /// Returns `true` if the actor administers the repository.
    pub fn is_admin(&self) -> bool {
        self.access_mode >= AccessMode::Admin
    }

    /// Returns `true` if the actor may read the given unit.
    pub fn can_read(&self, unit: UnitType) -> bool {
        if self.is_admin() {
            return true;
        }
        self.access_mode >= AccessMode::Read && self.units.contains(&unit)
    }

    /// Returns `true` if the actor may read pull requests (`is_pull`) or
    /// issues (`!is_pull`).
    pub fn can_read_issues_or_pulls(&self, is_pull: bool) -> bool {
        if is_pull {
            self.can_read(UnitType::PullRequests)
        } else {
            self.can_read(UnitType::Issues)
        }
    }
}

/// A repository record, including its fork lineage.
///
/// A repository has at most one fork parent (`fork_id`), so fork relations
/// form a forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Unique id of the repository
    pub id: u64,

    /// Id of the owning account
    pub owner_id: u64,

    /// Login of the owning account
    pub owner_name: String,

    /// Name of the repository
    pub name: String,

    /// Whether the repository was created as a fork
    #[serde(default)]
    pub is_fork: bool,

    /// Id of the repository this one was forked from
    #[serde(default)]
    pub fork_id: Option<u64>,

    /// Whether the repository is hidden from the public
    #[serde(default)]
    pub is_private: bool,
}

impl Repository {
    /// The `owner/name` form of the repository name.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner_name, self.name)
    }

    /// Id of the fork parent, only when the repository is a fork.
    pub fn fork_parent_id(&self) -> Option<u64> {
        if self.is_fork {
            self.fork_id
        } else {
            None
        }
    }
}

/// A signature attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Display name recorded in the commit
    pub name: String,

    /// Email address recorded in the commit
    pub email: String,

    /// Time of the signature, with the recorded offset
    pub when: DateTime<FixedOffset>,
}

/// Repository units that can be permission-gated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// Source code, branches and commits
    Code,
    /// Issue tracker
    Issues,
    /// Pull requests
    PullRequests,
}

impl UnitType {
    /// Every unit type.
    pub fn all() -> [UnitType; 3] {
        [UnitType::Code, UnitType::Issues, UnitType::PullRequests]
    }
}

/// A platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique id of the account
    pub id: u64,

    /// The login name
    pub login: String,

    /// The display name
    #[serde(default)]
    pub full_name: String,

    /// The primary email address
    #[serde(default)]
    pub email: String,

    /// Whether the account administers the whole site
    #[serde(default)]
    pub is_admin: bool,
}
