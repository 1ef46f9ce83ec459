use async_trait::async_trait;

pub mod catalog;

pub mod errors;

pub mod local_git;

pub mod models;
use errors::Error;
use models::{
    CompareInfo, ListOptions, PullRequest, RawDiffKind, RepoPermission, Repository, User,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Trait for opening repository handles on the git plumbing collaborator.
///
/// The returned handle is a scoped resource: it is released when dropped, so
/// every exit path of the caller releases it exactly once.
///
/// # Example Implementation
///
/// ```rust,no_run
/// use forkcompare_developer_platforms::{GitBackend, GitRepository, errors::Error, models::Repository};
/// use async_trait::async_trait;
///
/// struct NullBackend;
///
/// #[async_trait]
/// impl GitBackend for NullBackend {
///     async fn open_repository(&self, repo: &Repository) -> Result<Box<dyn GitRepository>, Error> {
///         Err(Error::RepositoryNotFound(repo.owner_name.clone(), repo.name.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Opens a read handle on the repository's object store.
    ///
    /// # Arguments
    ///
    /// * `repo` - The repository record to open
    ///
    /// # Returns
    ///
    /// A `Result` containing the handle, or an error if the repository cannot
    /// be opened
    async fn open_repository(&self, repo: &Repository) -> Result<Box<dyn GitRepository>, Error>;
}

/// Read operations on an open repository handle.
///
/// Comparisons that span two repositories are driven from the head handle:
/// after [`GitRepository::compare_info`] has been called with a distinct base
/// repository, the base objects stay visible to this handle so that
/// [`GitRepository::raw_diff`] can reach the base commit.
#[async_trait]
pub trait GitRepository: Send + Sync {
    /// Returns `true` if `id` is the full id of an existing commit.
    async fn is_commit_exist(&self, id: &str) -> Result<bool, Error>;

    /// Returns `true` if a local branch with this name exists.
    async fn is_branch_exist(&self, name: &str) -> Result<bool, Error>;

    /// Returns `true` if a tag with this name exists.
    async fn is_tag_exist(&self, name: &str) -> Result<bool, Error>;

    /// Looks up a commit by an abbreviated id.
    ///
    /// # Returns
    ///
    /// `Ok(Some(full_id))` if exactly one commit matches, `Ok(None)` if no
    /// commit or more than one commit matches
    async fn find_commit_by_prefix(&self, prefix: &str) -> Result<Option<String>, Error>;

    /// Returns the commit id a branch points at.
    async fn branch_commit_id(&self, name: &str) -> Result<String, Error>;

    /// Returns the commit id a tag points at, peeling annotated tags.
    async fn tag_commit_id(&self, name: &str) -> Result<String, Error>;

    /// Lists the names of all local branches.
    async fn branches(&self) -> Result<Vec<String>, Error>;

    /// Computes the merge base of `base_ref` (in `base_repo`) and `head_ref`
    /// (in this repository) and walks the commit range between them.
    ///
    /// # Arguments
    ///
    /// * `base_repo` - The repository `base_ref` lives in; may be this repository
    /// * `base_ref` - Fully qualified ref or full commit id on the base side
    /// * `head_ref` - Fully qualified ref or full commit id on the head side
    /// * `options` - The page window of commits to return
    async fn compare_info(
        &self,
        base_repo: &Repository,
        base_ref: &str,
        head_ref: &str,
        options: ListOptions,
    ) -> Result<CompareInfo, Error>;

    /// Produces the raw diff or patch text between two commits.
    ///
    /// Generation stops once more than `max_bytes` bytes are buffered, so the
    /// result holds at most `max_bytes + 1` bytes. A result longer than
    /// `max_bytes` means the text was cut short.
    async fn raw_diff(
        &self,
        base_commit: &str,
        head_commit: &str,
        kind: RawDiffKind,
        max_bytes: usize,
    ) -> Result<Vec<u8>, Error>;
}

/// Trait for fetching repository records and their fork relationships.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Fetches a repository by owner login and repository name.
    async fn get_repository_by_owner_and_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Repository, Error>;

    /// Fetches a repository by id.
    async fn get_repository_by_id(&self, id: u64) -> Result<Repository, Error>;

    /// Finds the fork of `repo_id` that is owned by `owner_id`, if any.
    async fn find_fork(&self, owner_id: u64, repo_id: u64) -> Result<Option<Repository>, Error>;
}

/// Trait for looking up platform accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetches an account by login, `Ok(None)` if it does not exist.
    async fn get_user_by_name(&self, login: &str) -> Result<Option<User>, Error>;

    /// Fetches the account owning an email address, `Ok(None)` if no account
    /// owns it.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;
}

/// Trait for the access-control collaborator.
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Computes the permissions `actor` holds on `repo`. `None` is the
    /// anonymous actor.
    async fn repo_permission(
        &self,
        repo: &Repository,
        actor: Option<&User>,
    ) -> Result<RepoPermission, Error>;
}

/// Trait for reading stored pull requests.
#[async_trait]
pub trait PullRequestStore: Send + Sync {
    /// Finds an open, unmerged pull request between the given branches.
    async fn find_unmerged_pull_request(
        &self,
        head_repo_id: u64,
        base_repo_id: u64,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<Option<PullRequest>, Error>;

    /// Fetches a pull request by its per-repository index.
    async fn get_pull_request_by_index(
        &self,
        base_repo_id: u64,
        index: u64,
    ) -> Result<PullRequest, Error>;
}

/// The persistence collaborators the comparison core consumes.
///
/// Implemented automatically for every type that implements all of the
/// persistence traits.
pub trait Catalog: RepositoryStore + AccountStore + AccessControl + PullRequestStore {}

impl<T> Catalog for T where T: RepositoryStore + AccountStore + AccessControl + PullRequestStore {}
