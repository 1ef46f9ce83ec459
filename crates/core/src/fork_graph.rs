//! Head repository discovery across fork relationships.
//!
//! A compare request names its head as `branch`, `owner:branch` or
//! `owner/repo:branch`. When only an owner is given, the head repository is
//! found by trying a short, fixed list of candidates in order. The first
//! candidate owned by the head owner wins.

use forkcompare_developer_platforms::models::{Repository, User};
use forkcompare_developer_platforms::{AccountStore, RepositoryStore};
use tracing::{debug, info};

use crate::config::COMPARE_SEPARATOR;
use crate::errors::CompareError;

#[cfg(test)]
#[path = "fork_graph_tests.rs"]
mod tests;

/// The head side of a compare path, as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadSpec {
    pub owner: Option<String>,
    pub repo_name: Option<String>,
    pub branch: String,
}

impl HeadSpec {
    /// Parses `branch`, `owner:branch` or `owner/repo:branch`.
    ///
    /// # Examples
    ///
    /// ```
    /// use forkcompare_core::fork_graph::HeadSpec;
    ///
    /// let spec = HeadSpec::parse("bob:feature").unwrap();
    /// assert_eq!(spec.owner.as_deref(), Some("bob"));
    /// assert_eq!(spec.branch, "feature");
    ///
    /// assert!(HeadSpec::parse("bob:feature:extra").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, CompareError> {
        let malformed = || CompareError::NotFound(format!("head '{}'", raw));
        let parts: Vec<&str> = raw.split(':').collect();

        match parts.as_slice() {
            [branch] if !branch.is_empty() => Ok(Self {
                owner: None,
                repo_name: None,
                branch: branch.to_string(),
            }),
            [head, branch] if !head.is_empty() && !branch.is_empty() => {
                let names: Vec<&str> = head.split('/').collect();
                match names.as_slice() {
                    [owner] => Ok(Self {
                        owner: Some(owner.to_string()),
                        repo_name: None,
                        branch: branch.to_string(),
                    }),
                    [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self {
                        owner: Some(owner.to_string()),
                        repo_name: Some(name.to_string()),
                        branch: branch.to_string(),
                    }),
                    _ => Err(malformed()),
                }
            }
            _ => Err(malformed()),
        }
    }
}

/// Splits `<base ref>...<head spec>` at the first separator.
pub fn parse_compare_path(path: &str) -> Result<(String, HeadSpec), CompareError> {
    let (base, head) = path
        .split_once(COMPARE_SEPARATOR)
        .ok_or_else(|| CompareError::NotFound(format!("compare path '{}'", path)))?;

    if base.is_empty() {
        return Err(CompareError::NotFound(format!(
            "compare path '{}'",
            path
        )));
    }

    Ok((base.to_string(), HeadSpec::parse(head)?))
}

/// One candidate-producing step of head discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStep {
    /// The repository the base was forked from
    BaseForkRoot,
    /// The actor's own fork of the base
    ActorOwnFork,
    /// The head owner's fork of the base
    HeadOwnerForkOfBase,
    /// The head owner's fork of the repository the base was forked from
    HeadOwnerForkOfRoot,
}

pub const DISCOVERY_ORDER: [DiscoveryStep; 4] = [
    DiscoveryStep::BaseForkRoot,
    DiscoveryStep::ActorOwnFork,
    DiscoveryStep::HeadOwnerForkOfBase,
    DiscoveryStep::HeadOwnerForkOfRoot,
];

/// Repositories related to the base, gathered once per request.
#[derive(Debug, Clone, Default)]
pub struct ForkDiscoveryContext {
    /// The fork parent of the base, when the base is a fork
    pub root_repo: Option<Repository>,

    /// The actor's fork of the base, when the actor does not own the base
    pub own_fork_repo: Option<Repository>,
}

/// Where the head of a comparison lives.
#[derive(Debug, Clone)]
pub struct HeadResolution {
    /// Login of the head owner
    pub head_owner: String,

    /// `None` only when `no_relation` is set
    pub head_repo: Option<Repository>,

    pub head_branch: String,
    pub is_same_repo: bool,

    /// The head owner has no repository related to the base
    pub no_relation: bool,

    /// The discovery step that produced the head, if discovery ran
    pub matched_step: Option<DiscoveryStep>,

    pub context: ForkDiscoveryContext,
}

pub struct ForkGraphResolver<'a, S: RepositoryStore + AccountStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RepositoryStore + AccountStore + ?Sized> ForkGraphResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Finds the head repository for `spec` relative to `base`.
    ///
    /// An owner without a related repository is reported through
    /// `no_relation`, not as an error.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown head owner or repository, `ServerError` when
    /// a store lookup fails.
    pub async fn resolve_head(
        &self,
        base: &Repository,
        actor: Option<&User>,
        spec: &HeadSpec,
    ) -> Result<HeadResolution, CompareError> {
        let context = self.discovery_context(base, actor).await?;

        let (head_owner, head_owner_id, direct) = match (&spec.owner, &spec.repo_name) {
            (None, _) => (base.owner_name.clone(), base.owner_id, Some(base.clone())),
            (Some(owner), Some(name)) => {
                let repo = self
                    .store
                    .get_repository_by_owner_and_name(owner, name)
                    .await?;
                (repo.owner_name.clone(), repo.owner_id, Some(repo))
            }
            (Some(owner), None) => {
                let user = self
                    .store
                    .get_user_by_name(owner)
                    .await?
                    .ok_or_else(|| CompareError::NotFound(format!("user '{}'", owner)))?;
                let direct = (user.id == base.owner_id).then(|| base.clone());
                (user.login, user.id, direct)
            }
        };

        if let Some(repo) = direct {
            return Ok(HeadResolution {
                head_owner,
                is_same_repo: repo.id == base.id,
                head_repo: Some(repo),
                head_branch: spec.branch.clone(),
                no_relation: false,
                matched_step: None,
                context,
            });
        }

        for step in DISCOVERY_ORDER {
            if let Some(repo) = self.candidate(step, base, head_owner_id, &context).await? {
                debug!(
                    repository_owner = base.owner_name.as_str(),
                    repository = base.name.as_str(),
                    head_repository = %repo.full_name(),
                    step = ?step,
                    "Discovered head repository",
                );
                return Ok(HeadResolution {
                    head_owner,
                    is_same_repo: repo.id == base.id,
                    head_repo: Some(repo),
                    head_branch: spec.branch.clone(),
                    no_relation: false,
                    matched_step: Some(step),
                    context,
                });
            }
        }

        info!(
            repository_owner = base.owner_name.as_str(),
            repository = base.name.as_str(),
            head_owner = head_owner.as_str(),
            "Head owner has no repository related to the base",
        );
        Ok(HeadResolution {
            head_owner,
            head_repo: None,
            head_branch: spec.branch.clone(),
            is_same_repo: false,
            no_relation: true,
            matched_step: None,
            context,
        })
    }

    async fn discovery_context(
        &self,
        base: &Repository,
        actor: Option<&User>,
    ) -> Result<ForkDiscoveryContext, CompareError> {
        let root_repo = match base.fork_parent_id() {
            Some(parent_id) => match self.store.get_repository_by_id(parent_id).await {
                Ok(repo) => Some(repo),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(CompareError::ServerError(e.to_string())),
            },
            None => None,
        };

        let own_fork_repo = match actor {
            Some(user) if user.id != base.owner_id => {
                self.store.find_fork(user.id, base.id).await.map_err(server_error)?
            }
            _ => None,
        };

        Ok(ForkDiscoveryContext {
            root_repo,
            own_fork_repo,
        })
    }

    async fn candidate(
        &self,
        step: DiscoveryStep,
        base: &Repository,
        head_owner_id: u64,
        context: &ForkDiscoveryContext,
    ) -> Result<Option<Repository>, CompareError> {
        let owned = |repo: &Option<Repository>| {
            repo.as_ref()
                .filter(|r| r.owner_id == head_owner_id)
                .cloned()
        };

        match step {
            DiscoveryStep::BaseForkRoot => Ok(owned(&context.root_repo)),
            DiscoveryStep::ActorOwnFork => Ok(owned(&context.own_fork_repo)),
            DiscoveryStep::HeadOwnerForkOfBase => self
                .store
                .find_fork(head_owner_id, base.id)
                .await
                .map_err(server_error),
            DiscoveryStep::HeadOwnerForkOfRoot => match base.fork_parent_id() {
                Some(parent_id) => self
                    .store
                    .find_fork(head_owner_id, parent_id)
                    .await
                    .map_err(server_error),
                None => Ok(None),
            },
        }
    }
}

fn server_error(err: forkcompare_developer_platforms::errors::Error) -> CompareError {
    CompareError::ServerError(err.to_string())
}
