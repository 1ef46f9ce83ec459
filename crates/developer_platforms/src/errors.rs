#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Error types for collaborator operations.
///
/// This enum represents the failures that the git plumbing, repository store,
/// account store, access-control and pull-request collaborators can report.
/// Variants that describe a missing entity are grouped by [`Error::is_not_found`]
/// so callers can translate them into a "not found" outcome without inspecting
/// the individual variants.
///
/// # Examples
///
/// ```rust
/// use forkcompare_developer_platforms::errors::Error;
///
/// let missing = Error::RepositoryNotFound("alice".to_string(), "proj".to_string());
/// assert!(missing.is_not_found());
/// assert_eq!(missing.to_string(), "Repository not found: alice/proj");
///
/// let failure = Error::GitOperationFailed("merge-base: no common ancestor".to_string());
/// assert!(!failure.is_not_found());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A backend call was abandoned before it completed.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// The catalog file could not be parsed or is internally inconsistent.
    ///
    /// Examples include a repository owned by an unknown user, or a fork
    /// pointing at a repository id that does not exist.
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// A git plumbing call failed.
    ///
    /// This covers failures to open a repository, compute a merge base, walk
    /// commits or produce diff text. The string parameter names the operation
    /// and carries the backend message.
    #[error("Git operation failed: {0}")]
    GitOperationFailed(String),

    /// The requested pull request does not exist.
    ///
    /// Parameters: base repository id, pull request index
    #[error("Pull request not found: #{1} in repository {0}")]
    PullRequestNotFound(u64, u64),

    /// A branch, tag or commit could not be found in a repository.
    #[error("Reference not found: {0}")]
    RefNotFound(String),

    /// The requested repository does not exist.
    ///
    /// Parameters: owner name, repository name
    #[error("Repository not found: {0}/{1}")]
    RepositoryNotFound(String, String),

    /// The requested repository id does not exist.
    #[error("Repository not found: id {0}")]
    RepositoryIdNotFound(u64),

    /// A persistence collaborator failed for a reason unrelated to the
    /// existence of the requested record.
    #[error("Store failure: {0}")]
    StoreFailure(String),
}

impl Error {
    /// Returns `true` if the error describes a missing entity rather than a
    /// backend failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::PullRequestNotFound(_, _)
                | Error::RefNotFound(_)
                | Error::RepositoryNotFound(_, _)
                | Error::RepositoryIdNotFound(_)
        )
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        if err.code() == git2::ErrorCode::NotFound {
            Error::RefNotFound(err.message().to_string())
        } else {
            Error::GitOperationFailed(err.message().to_string())
        }
    }
}
