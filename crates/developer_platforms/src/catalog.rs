//! # Static catalog
//!
//! An in-memory implementation of the persistence collaborators, loaded from
//! a TOML description of accounts, repositories, collaborators and pull
//! requests.
//!
//! ```toml
//! [[users]]
//! id = 10
//! login = "alice"
//! email = "alice@example.com"
//!
//! [[repositories]]
//! id = 1
//! owner = "alice"
//! name = "proj"
//!
//! [[repositories]]
//! id = 2
//! owner = "bob"
//! name = "proj"
//! fork_of = 1
//!
//! [[collaborators]]
//! repository = "alice/proj"
//! user = "carol"
//! access = "read"
//! units = ["code"]
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::models::{AccessMode, PullRequest, RepoPermission, Repository, UnitType, User};
use crate::{AccessControl, AccountStore, PullRequestStore, RepositoryStore};

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    users: Vec<User>,

    #[serde(default)]
    repositories: Vec<RepositoryEntry>,

    #[serde(default)]
    collaborators: Vec<CollaboratorEntry>,

    #[serde(default)]
    pull_requests: Vec<PullRequest>,
}

#[derive(Debug, Deserialize)]
struct CollaboratorEntry {
    /// `owner/name` of the repository
    repository: String,

    /// Login of the collaborator
    user: String,

    access: AccessMode,

    #[serde(default = "CollaboratorEntry::default_units")]
    units: Vec<UnitType>,
}

impl CollaboratorEntry {
    fn default_units() -> Vec<UnitType> {
        UnitType::all().to_vec()
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryEntry {
    id: u64,

    /// Login of the owning account
    owner: String,

    name: String,

    /// Id of the repository this one is a fork of
    #[serde(default)]
    fork_of: Option<u64>,

    #[serde(default)]
    private: bool,
}

/// In-memory repository, account, permission and pull-request store.
///
/// Permissions follow a simple policy: site administrators and repository
/// owners see everything, listed collaborators get their configured access,
/// and everyone (including anonymous actors) can read public repositories.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    users: Vec<User>,
    repositories: Vec<Repository>,
    collaborators: HashMap<(u64, u64), RepoPermission>,
    pull_requests: Vec<PullRequest>,
}

impl StaticCatalog {
    /// Loads a catalog from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        debug!("Loading catalog from {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| {
            Error::InvalidCatalog(format!("Failed to read catalog file {:?}: {}", path, e))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parses and validates a catalog from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCatalog`] when the text does not parse, when an
    /// id is duplicated, when a repository or collaborator references an
    /// unknown account or repository, or when fork relations form a cycle.
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| Error::InvalidCatalog(format!("Failed to parse catalog: {}", e)))?;

        let mut user_ids = HashSet::new();
        for user in &file.users {
            if !user_ids.insert(user.id) {
                return Err(Error::InvalidCatalog(format!(
                    "Duplicate user id {}",
                    user.id
                )));
            }
        }

        let mut repositories = Vec::with_capacity(file.repositories.len());
        for entry in file.repositories {
            let owner = find_user(&file.users, &entry.owner).ok_or_else(|| {
                Error::InvalidCatalog(format!(
                    "Repository {}/{} is owned by unknown user '{}'",
                    entry.owner, entry.name, entry.owner
                ))
            })?;

            if repositories.iter().any(|r: &Repository| r.id == entry.id) {
                return Err(Error::InvalidCatalog(format!(
                    "Duplicate repository id {}",
                    entry.id
                )));
            }

            repositories.push(Repository {
                id: entry.id,
                owner_id: owner.id,
                owner_name: owner.login.clone(),
                name: entry.name,
                is_fork: entry.fork_of.is_some(),
                fork_id: entry.fork_of,
                is_private: entry.private,
            });
        }

        validate_fork_forest(&repositories)?;

        let mut collaborators = HashMap::new();
        for entry in file.collaborators {
            let (owner, name) = entry.repository.split_once('/').ok_or_else(|| {
                Error::InvalidCatalog(format!(
                    "Collaborator repository '{}' is not of the form owner/name",
                    entry.repository
                ))
            })?;
            let repo = find_repository(&repositories, owner, name).ok_or_else(|| {
                Error::InvalidCatalog(format!(
                    "Collaborator entry references unknown repository '{}'",
                    entry.repository
                ))
            })?;
            let user = find_user(&file.users, &entry.user).ok_or_else(|| {
                Error::InvalidCatalog(format!(
                    "Collaborator entry references unknown user '{}'",
                    entry.user
                ))
            })?;

            collaborators.insert(
                (repo.id, user.id),
                RepoPermission {
                    access_mode: entry.access,
                    units: entry.units,
                },
            );
        }

        for pr in &file.pull_requests {
            for repo_id in [pr.base_repo_id, pr.head_repo_id] {
                if !repositories.iter().any(|r| r.id == repo_id) {
                    return Err(Error::InvalidCatalog(format!(
                        "Pull request {} references unknown repository id {}",
                        pr.id, repo_id
                    )));
                }
            }
        }

        Ok(Self {
            users: file.users,
            repositories,
            collaborators,
            pull_requests: file.pull_requests,
        })
    }

    /// All repositories in the catalog.
    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    fn permission_for(&self, repo: &Repository, actor: Option<&User>) -> RepoPermission {
        if let Some(user) = actor {
            if user.is_admin {
                return RepoPermission {
                    access_mode: AccessMode::Admin,
                    units: UnitType::all().to_vec(),
                };
            }

            if repo.owner_id == user.id {
                return RepoPermission::owner();
            }

            if let Some(permission) = self.collaborators.get(&(repo.id, user.id)) {
                if permission.access_mode > AccessMode::None {
                    return permission.clone();
                }
            }
        }

        if repo.is_private {
            RepoPermission::none()
        } else {
            RepoPermission {
                access_mode: AccessMode::Read,
                units: UnitType::all().to_vec(),
            }
        }
    }
}

#[async_trait]
impl AccessControl for StaticCatalog {
    #[instrument(skip(self))]
    async fn repo_permission(
        &self,
        repo: &Repository,
        actor: Option<&User>,
    ) -> Result<RepoPermission, Error> {
        Ok(self.permission_for(repo, actor))
    }
}

#[async_trait]
impl AccountStore for StaticCatalog {
    async fn get_user_by_name(&self, login: &str) -> Result<Option<User>, Error> {
        Ok(find_user(&self.users, login).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self
            .users
            .iter()
            .find(|u| !u.email.is_empty() && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl PullRequestStore for StaticCatalog {
    async fn find_unmerged_pull_request(
        &self,
        head_repo_id: u64,
        base_repo_id: u64,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<Option<PullRequest>, Error> {
        Ok(self
            .pull_requests
            .iter()
            .find(|pr| {
                !pr.has_merged
                    && pr.head_repo_id == head_repo_id
                    && pr.base_repo_id == base_repo_id
                    && pr.head_branch == head_branch
                    && pr.base_branch == base_branch
            })
            .cloned())
    }

    async fn get_pull_request_by_index(
        &self,
        base_repo_id: u64,
        index: u64,
    ) -> Result<PullRequest, Error> {
        self.pull_requests
            .iter()
            .find(|pr| pr.base_repo_id == base_repo_id && pr.index == index)
            .cloned()
            .ok_or(Error::PullRequestNotFound(base_repo_id, index))
    }
}

#[async_trait]
impl RepositoryStore for StaticCatalog {
    async fn get_repository_by_owner_and_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Repository, Error> {
        find_repository(&self.repositories, owner, name)
            .cloned()
            .ok_or_else(|| Error::RepositoryNotFound(owner.to_string(), name.to_string()))
    }

    async fn get_repository_by_id(&self, id: u64) -> Result<Repository, Error> {
        self.repositories
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(Error::RepositoryIdNotFound(id))
    }

    async fn find_fork(&self, owner_id: u64, repo_id: u64) -> Result<Option<Repository>, Error> {
        Ok(self
            .repositories
            .iter()
            .find(|r| r.owner_id == owner_id && r.fork_parent_id() == Some(repo_id))
            .cloned())
    }
}

fn find_repository<'a>(
    repositories: &'a [Repository],
    owner: &str,
    name: &str,
) -> Option<&'a Repository> {
    repositories
        .iter()
        .find(|r| r.owner_name.eq_ignore_ascii_case(owner) && r.name.eq_ignore_ascii_case(name))
}

fn find_user<'a>(users: &'a [User], login: &str) -> Option<&'a User> {
    users.iter().find(|u| u.login.eq_ignore_ascii_case(login))
}

/// Every fork parent must exist and following parents must terminate.
fn validate_fork_forest(repositories: &[Repository]) -> Result<(), Error> {
    for repo in repositories {
        let mut visited = HashSet::from([repo.id]);
        let mut current = repo;

        while let Some(parent_id) = current.fork_parent_id() {
            let parent = repositories
                .iter()
                .find(|r| r.id == parent_id)
                .ok_or_else(|| {
                    Error::InvalidCatalog(format!(
                        "Repository {} is a fork of unknown repository id {}",
                        current.full_name(),
                        parent_id
                    ))
                })?;

            if !visited.insert(parent.id) {
                return Err(Error::InvalidCatalog(format!(
                    "Fork relations of {} form a cycle",
                    repo.full_name()
                )));
            }
            current = parent;
        }
    }

    Ok(())
}
