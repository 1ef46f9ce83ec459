//! # Forkcompare Core
//!
//! Core logic for turning a comparison request such as `main...bob:feature`
//! into a permission-checked, size-bounded diff and commit list, possibly
//! across forked repositories.
//!
//! A request flows through these stages:
//! - the head spec is parsed and the head repository is discovered through
//!   the fork graph ([`fork_graph`])
//! - both refs are disambiguated into branches, tags or commits ([`refs`])
//! - read access is checked on both sides ([`permissions`])
//! - the merge base, commit page and truncated diff are computed ([`compare`])
//! - commits are decorated with platform accounts ([`enricher`])
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use forkcompare_core::{config::PageRequest, CompareService};
//! use forkcompare_developer_platforms::catalog::StaticCatalog;
//! use forkcompare_developer_platforms::local_git::LocalGitBackend;
//! use std::path::Path;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = StaticCatalog::load(Path::new("catalog.toml"))?;
//!     let service = CompareService::new(LocalGitBackend::new("/srv/git"), catalog);
//!
//!     let response = service
//!         .compare("alice", "proj", "main...bob:feature", None, PageRequest::default())
//!         .await?;
//!
//!     if response.result.no_relation {
//!         println!("bob has no fork of alice/proj");
//!     } else {
//!         println!("{} commits ahead", response.commit_count);
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;

use forkcompare_developer_platforms::models::{PullRequest, RawDiffKind, Repository, User};
use forkcompare_developer_platforms::{Catalog, GitBackend, GitRepository};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

pub mod compare;
use compare::{truncate_to_budget, CompareEngine, CompareResult};

pub mod config;
use config::{CompareLimits, ForkCompareConfig, PageRequest, BRANCH_PREFIX, DEFAULT_APP_URL};

pub mod enricher;
use enricher::{CommitEnricher, CommitView, UserCache};

pub mod errors;
use errors::CompareError;

pub mod fork_graph;
use fork_graph::{parse_compare_path, ForkGraphResolver};

pub mod merge_gate;
use merge_gate::{authorize_merge, MergeDecision, MergeReadiness};

pub mod permissions;
use permissions::PermissionGate;

pub mod refs;
use refs::RefKindResolver;

#[cfg(test)]
mod test_support;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Key of the head repository in [`CompareResponse::head_branches`]
pub const HEAD_BRANCHES_KEY: &str = "head";

/// A resolved comparison together with the context needed to offer a pull
/// request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompareResponse {
    #[serde(flatten)]
    pub result: CompareResult,

    /// Head and base are the same repository
    pub same_repo: bool,

    /// The head ref as resolved; a full commit id for abbreviated ids
    pub head_branch: String,

    /// Branches of the head repository and of other related repositories
    /// the actor can read, keyed by `head` or `owner/name`
    pub head_branches: BTreeMap<String, Vec<String>>,

    /// The open pull request between the same branches, if one exists
    pub pull_request: Option<PullRequest>,

    /// Number of commits in the whole range, not just the returned page
    pub commit_count: u64,
}

/// A stored pull request with its diff, patch and commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestDiff {
    pub pull_request: PullRequest,

    #[serde(serialize_with = "compare::serialize_lossy")]
    pub diff_raw: Vec<u8>,

    #[serde(serialize_with = "compare::serialize_lossy")]
    pub patch_raw: Vec<u8>,

    pub commits: Vec<CommitView>,
    pub commits_count: u64,
    pub commits_num_files: u64,
}

/// Entry point for comparison requests.
///
/// `CompareService` owns the git plumbing and the persistence collaborators
/// and runs each request as one sequential unit of work. Repository handles
/// opened during a request are released before the call returns, on every
/// path. Dropping the returned future cancels the request.
///
/// # Examples
///
/// ```rust,no_run
/// use forkcompare_core::{config::CompareLimits, CompareService};
/// use forkcompare_developer_platforms::{Catalog, GitBackend};
///
/// fn build<G: GitBackend, C: Catalog>(git: G, catalog: C) -> CompareService<G, C> {
///     let limits = CompareLimits {
///         max_page_size: 20,
///         ..CompareLimits::default()
///     };
///     CompareService::with_limits(git, catalog, limits, "https://git.example.com")
/// }
/// ```
pub struct CompareService<G: GitBackend, C: Catalog> {
    git: G,
    catalog: C,
    limits: CompareLimits,
    app_url: String,
}

impl<G: GitBackend, C: Catalog> CompareService<G, C> {
    /// Creates a service with the default limits.
    pub fn new(git: G, catalog: C) -> Self {
        Self::with_limits(git, catalog, CompareLimits::default(), DEFAULT_APP_URL)
    }

    pub fn with_limits(git: G, catalog: C, limits: CompareLimits, app_url: &str) -> Self {
        Self {
            git,
            catalog,
            limits,
            app_url: app_url.to_string(),
        }
    }

    /// Creates a service from a loaded configuration file.
    pub fn with_config(git: G, catalog: C, config: &ForkCompareConfig) -> Self {
        Self::with_limits(git, catalog, config.to_compare_limits(), &config.app_url)
    }

    pub fn limits(&self) -> &CompareLimits {
        &self.limits
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Looks up the acting account. `None` is the anonymous actor.
    ///
    /// # Errors
    ///
    /// `NotFound` when a login is given but no such account exists.
    pub async fn find_actor(&self, login: Option<&str>) -> Result<Option<User>, CompareError> {
        match login {
            None => Ok(None),
            Some(login) => self
                .catalog
                .get_user_by_name(login)
                .await?
                .map(Some)
                .ok_or_else(|| CompareError::NotFound(format!("user '{}'", login))),
        }
    }

    /// Looks up the base repository and compares `path` against it.
    pub async fn compare(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        actor: Option<&User>,
        page: PageRequest,
    ) -> Result<CompareResponse, CompareError> {
        let base_repo = self
            .catalog
            .get_repository_by_owner_and_name(owner, name)
            .await?;

        self.resolve_compare(&base_repo, path, actor, page).await
    }

    /// Resolves and runs a comparison given as `<base ref>...<head spec>`.
    ///
    /// # Arguments
    ///
    /// * `base_repo` - The repository the comparison is requested on
    /// * `path` - The compare path, for example `main...bob:feature`
    /// * `actor` - The requesting account, `None` when anonymous
    /// * `page` - The commit page window, normalized against the limits
    ///
    /// # Returns
    ///
    /// The comparison. A head owner without a related repository yields a
    /// response with `no_relation` set and no diff.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or unreadable repositories, users and refs, or a
    /// malformed path. `ServerError` for backend failures.
    #[instrument(
        skip(self, base_repo, actor),
        fields(repository_owner = %base_repo.owner_name, repository = %base_repo.name)
    )]
    pub async fn resolve_compare(
        &self,
        base_repo: &Repository,
        path: &str,
        actor: Option<&User>,
        page: PageRequest,
    ) -> Result<CompareResponse, CompareError> {
        let (base_raw, head_spec) = parse_compare_path(path)?;
        let gate = PermissionGate::new(&self.catalog);

        gate.authorize_base(actor, base_repo).await?;

        let base_git = self.git.open_repository(base_repo).await.map_err(open_error)?;
        let base_ref = RefKindResolver::new(base_git.as_ref())
            .resolve(&base_raw)
            .await?;

        let resolution = ForkGraphResolver::new(&self.catalog)
            .resolve_head(base_repo, actor, &head_spec)
            .await?;

        let head_repo = match resolution.head_repo.as_ref() {
            Some(repo) if !resolution.no_relation => repo,
            _ => {
                return Ok(CompareResponse {
                    result: CompareResult {
                        base_commit_id: base_ref.commit_id().unwrap_or_default().to_string(),
                        no_relation: true,
                        ..CompareResult::default()
                    },
                    head_branch: resolution.head_branch,
                    ..CompareResponse::default()
                });
            }
        };

        gate.authorize_head(actor, base_repo, head_repo).await?;

        let opened_head = if resolution.is_same_repo {
            None
        } else {
            Some(self.git.open_repository(head_repo).await.map_err(open_error)?)
        };
        let head_git: &dyn GitRepository = match opened_head.as_ref() {
            Some(handle) => handle.as_ref(),
            None => base_git.as_ref(),
        };

        let head_ref = RefKindResolver::new(head_git)
            .resolve(&resolution.head_branch)
            .await?;

        let mut head_branches = BTreeMap::new();
        head_branches.insert(HEAD_BRANCHES_KEY.to_string(), head_git.branches().await?);
        for related in [&resolution.context.root_repo, &resolution.context.own_fork_repo]
            .into_iter()
            .flatten()
        {
            if related.id == base_repo.id || related.id == head_repo.id {
                continue;
            }
            let key = related.full_name();
            if head_branches.contains_key(&key) {
                continue;
            }
            if let Some(branches) = self.readable_branches(actor, related).await? {
                head_branches.insert(key, branches);
            }
        }

        let outcome = CompareEngine::new(&self.limits)
            .compare_refs(head_git, base_repo, &base_ref, &head_ref, page)
            .await?;

        let pull_request = self
            .catalog
            .find_unmerged_pull_request(head_repo.id, base_repo.id, head_ref.name(), base_ref.name())
            .await
            .map_err(|e| CompareError::ServerError(e.to_string()))?;

        let mut cache = UserCache::new();
        let commits = CommitEnricher::new(&self.catalog, &self.app_url)
            .enrich_all(head_repo, &outcome.commits, &mut cache)
            .await?;

        debug!(
            repository_owner = base_repo.owner_name.as_str(),
            repository = base_repo.name.as_str(),
            head_repository = %head_repo.full_name(),
            commits = commits.len(),
            total_commits = outcome.total_commits,
            nothing_to_compare = outcome.nothing_to_compare,
            "Comparison assembled",
        );

        Ok(CompareResponse {
            result: CompareResult {
                merge_base: outcome.merge_base,
                base_commit_id: outcome.base_commit_id,
                head_commit_id: outcome.head_commit_id,
                commits,
                num_files: outcome.num_files,
                diff_raw: outcome.diff,
                nothing_to_compare: outcome.nothing_to_compare,
                diff_unavailable: outcome.diff_unavailable,
                no_relation: false,
            },
            same_repo: resolution.is_same_repo,
            head_branch: head_ref.name().to_string(),
            head_branches,
            pull_request,
            commit_count: outcome.total_commits,
        })
    }

    /// Returns the diff, patch and commits of a stored pull request.
    ///
    /// # Errors
    ///
    /// `NotFound` when the actor cannot read code and pull requests of the
    /// base, or when the pull request or its head branch does not exist.
    #[instrument(
        skip(self, base_repo, actor),
        fields(repository_owner = %base_repo.owner_name, repository = %base_repo.name)
    )]
    pub async fn pull_request_diff(
        &self,
        base_repo: &Repository,
        index: u64,
        actor: Option<&User>,
    ) -> Result<PullRequestDiff, CompareError> {
        PermissionGate::new(&self.catalog)
            .authorize_base(actor, base_repo)
            .await?;

        let pr = self
            .catalog
            .get_pull_request_by_index(base_repo.id, index)
            .await?;
        let head_repo = if pr.is_same_repo() {
            base_repo.clone()
        } else {
            self.catalog.get_repository_by_id(pr.head_repo_id).await?
        };

        let head_git = self.git.open_repository(&head_repo).await.map_err(open_error)?;
        let head_commit_id = head_git.branch_commit_id(&pr.head_branch).await?;

        let options = self.limits.normalize(PageRequest::default());
        let head_qualified = format!("{}{}", BRANCH_PREFIX, pr.head_branch);
        let info = head_git
            .compare_info(base_repo, &pr.merge_base, &head_qualified, options)
            .await
            .map_err(|e| CompareError::ServerError(format!("pull request #{}: {}", index, e)))?;

        if head_commit_id == info.merge_base {
            debug!(pull_request = index, "Pull request head is at its merge base");
            return Ok(PullRequestDiff {
                pull_request: pr,
                diff_raw: Vec::new(),
                patch_raw: Vec::new(),
                commits: Vec::new(),
                commits_count: 0,
                commits_num_files: 0,
            });
        }

        let diff = head_git
            .raw_diff(
                &info.merge_base,
                &head_commit_id,
                RawDiffKind::Diff,
                self.limits.max_diff_bytes,
            )
            .await
            .map_err(|e| CompareError::ServerError(format!("raw diff: {}", e)))?;
        let patch = head_git
            .raw_diff(
                &info.merge_base,
                &head_commit_id,
                RawDiffKind::Patch,
                self.limits.max_patch_bytes,
            )
            .await
            .map_err(|e| CompareError::ServerError(format!("raw patch: {}", e)))?;

        let mut cache = UserCache::new();
        let commits = CommitEnricher::new(&self.catalog, &self.app_url)
            .enrich_all(&head_repo, &info.commits, &mut cache)
            .await?;

        Ok(PullRequestDiff {
            pull_request: pr,
            diff_raw: truncate_to_budget(diff, self.limits.max_diff_bytes),
            patch_raw: truncate_to_budget(patch, self.limits.max_patch_bytes),
            commits,
            commits_count: info.total_commits,
            commits_num_files: info.num_files,
        })
    }

    /// Decides whether `actor` may merge the pull request `index`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the actor cannot read the base, or the pull request is
    /// missing or closed.
    #[instrument(
        skip(self, base_repo, actor, readiness),
        fields(repository_owner = %base_repo.owner_name, repository = %base_repo.name)
    )]
    pub async fn check_merge_allowed(
        &self,
        base_repo: &Repository,
        index: u64,
        actor: Option<&User>,
        readiness: &MergeReadiness,
        force: bool,
    ) -> Result<MergeDecision, CompareError> {
        let permission = PermissionGate::new(&self.catalog)
            .authorize_base(actor, base_repo)
            .await?;

        let pr = self
            .catalog
            .get_pull_request_by_index(base_repo.id, index)
            .await?;
        if readiness.is_closed {
            return Err(CompareError::NotFound(format!("pull request #{}", index)));
        }

        let decision = authorize_merge(&pr, readiness, &permission, force);
        match &decision {
            MergeDecision::Refused(reason) => warn!(
                pull_request = index,
                reason = %reason,
                "Merge refused",
            ),
            _ => info!(pull_request = index, decision = ?decision, "Merge allowed"),
        }

        Ok(decision)
    }

    /// Branches of `repo`, or `None` when the actor cannot read its code.
    async fn readable_branches(
        &self,
        actor: Option<&User>,
        repo: &Repository,
    ) -> Result<Option<Vec<String>>, CompareError> {
        if !PermissionGate::new(&self.catalog)
            .can_read_code(actor, repo)
            .await?
        {
            return Ok(None);
        }

        let git = self.git.open_repository(repo).await.map_err(open_error)?;
        Ok(Some(git.branches().await?))
    }
}

/// A repository record without storage is a backend fault.
fn open_error(err: forkcompare_developer_platforms::errors::Error) -> CompareError {
    CompareError::ServerError(format!("open repository: {}", err))
}
