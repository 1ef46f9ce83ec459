//! Ref-kind disambiguation.
//!
//! Ref strings arrive from URLs and may name a commit, a branch, a tag or an
//! abbreviated commit id. The kind decides how the ref is qualified before it
//! is handed to the comparison plumbing.

use forkcompare_developer_platforms::errors::Error as PlatformError;
use forkcompare_developer_platforms::GitRepository;
use serde::Serialize;
use tracing::debug;

use crate::config::{BRANCH_PREFIX, FULL_COMMIT_ID_REGEX, SHORT_COMMIT_ID_REGEX, TAG_PREFIX};
use crate::errors::CompareError;

#[cfg(test)]
#[path = "refs_tests.rs"]
mod tests;

/// What a ref string turned out to denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Branch,
    Tag,
    Commit,
    /// An abbreviated commit id, used as the full id from then on
    ShortCommit,
    Unresolved,
}

/// Probes run in this order; the first match decides the kind.
pub const PROBE_ORDER: [RefKind; 4] = [
    RefKind::Commit,
    RefKind::Branch,
    RefKind::Tag,
    RefKind::ShortCommit,
];

/// A ref string and, once resolved, its kind and full commit id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefSpec {
    raw: String,
    kind: RefKind,
    commit_id: Option<String>,
}

impl RefSpec {
    pub fn unresolved(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            kind: RefKind::Unresolved,
            commit_id: None,
        }
    }

    fn resolved(raw: &str, kind: RefKind, commit_id: String) -> Self {
        Self {
            raw: raw.to_string(),
            kind,
            commit_id: Some(commit_id),
        }
    }

    /// The ref string as supplied by the caller.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }

    /// The full commit id, `None` while unresolved.
    pub fn commit_id(&self) -> Option<&str> {
        self.commit_id.as_deref()
    }

    /// The name under which the ref is stored: the branch or tag name, or the
    /// full commit id for commits.
    pub fn name(&self) -> &str {
        match self.kind {
            RefKind::Commit | RefKind::ShortCommit => self.commit_id.as_deref().unwrap_or(&self.raw),
            _ => &self.raw,
        }
    }

    /// The fully qualified form handed to the comparison plumbing.
    ///
    /// # Examples
    ///
    /// ```
    /// use forkcompare_core::refs::RefSpec;
    ///
    /// assert_eq!(RefSpec::unresolved("main").qualified(), None);
    /// ```
    pub fn qualified(&self) -> Option<String> {
        match self.kind {
            RefKind::Branch => Some(format!("{}{}", BRANCH_PREFIX, self.raw)),
            RefKind::Tag => Some(format!("{}{}", TAG_PREFIX, self.raw)),
            RefKind::Commit | RefKind::ShortCommit => self.commit_id.clone(),
            RefKind::Unresolved => None,
        }
    }
}

/// Resolves ref strings against one repository handle.
pub struct RefKindResolver<'a> {
    repo: &'a dyn GitRepository,
}

impl<'a> RefKindResolver<'a> {
    pub fn new(repo: &'a dyn GitRepository) -> Self {
        Self { repo }
    }

    /// Determines the kind of `raw` and its full commit id.
    ///
    /// # Errors
    ///
    /// `NotFound` when no probe matches, `ServerError` when the backend fails.
    pub async fn resolve(&self, raw: &str) -> Result<RefSpec, CompareError> {
        for kind in PROBE_ORDER {
            if let Some(commit_id) = self.probe(kind, raw).await? {
                debug!(reference = raw, kind = ?kind, commit = %commit_id, "Resolved reference");
                return Ok(RefSpec::resolved(raw, kind, commit_id));
            }
        }

        debug!(reference = raw, "Reference did not resolve");
        Err(CompareError::NotFound(format!("reference '{}'", raw)))
    }

    async fn probe(&self, kind: RefKind, raw: &str) -> Result<Option<String>, CompareError> {
        let found = match kind {
            RefKind::Commit => {
                if FULL_COMMIT_ID_REGEX.is_match(raw) && self.repo.is_commit_exist(raw).await? {
                    Some(raw.to_ascii_lowercase())
                } else {
                    None
                }
            }
            RefKind::Branch => {
                if self.repo.is_branch_exist(raw).await? {
                    Some(self.repo.branch_commit_id(raw).await.map_err(server_error)?)
                } else {
                    None
                }
            }
            RefKind::Tag => {
                if self.repo.is_tag_exist(raw).await? {
                    Some(self.repo.tag_commit_id(raw).await.map_err(server_error)?)
                } else {
                    None
                }
            }
            RefKind::ShortCommit => {
                if SHORT_COMMIT_ID_REGEX.is_match(raw) {
                    self.repo.find_commit_by_prefix(raw).await?
                } else {
                    None
                }
            }
            RefKind::Unresolved => None,
        };

        Ok(found)
    }
}

/// A ref that exists but cannot be peeled is a backend fault, not a missing ref.
fn server_error(err: PlatformError) -> CompareError {
    CompareError::ServerError(err.to_string())
}
