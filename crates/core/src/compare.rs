//! Merge base, commit range and bounded diff retrieval.

use forkcompare_developer_platforms::models::{Commit, RawDiffKind, Repository};
use forkcompare_developer_platforms::GitRepository;
use serde::{Serialize, Serializer};
use tracing::{debug, error};

use crate::config::{CompareLimits, PageRequest};
use crate::enricher::CommitView;
use crate::errors::CompareError;
use crate::refs::{RefKindResolver, RefSpec};

#[cfg(test)]
#[path = "compare_tests.rs"]
mod tests;

/// What the engine computed for one pair of resolved refs.
///
/// `commits` holds the requested page of `(merge_base, head]`, newest first.
/// When `nothing_to_compare` is set, `commits` and `diff` are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOutcome {
    pub merge_base: String,
    pub base_commit_id: String,
    pub head_commit_id: String,
    pub commits: Vec<Commit>,
    pub total_commits: u64,
    pub num_files: u64,
    pub diff: Vec<u8>,
    pub nothing_to_compare: bool,
    pub diff_unavailable: bool,
}

/// The comparison as exposed to API consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompareResult {
    pub merge_base: String,
    pub base_commit_id: String,
    pub head_commit_id: String,
    pub commits: Vec<CommitView>,
    pub num_files: u64,

    /// Diff text, cut at the diff budget. Serialized as text with invalid
    /// UTF-8 replaced.
    #[serde(serialize_with = "serialize_lossy")]
    pub diff_raw: Vec<u8>,

    pub nothing_to_compare: bool,
    pub diff_unavailable: bool,
    pub no_relation: bool,
}

/// Cuts `text` to at most `budget` bytes, with no regard for line or
/// character boundaries.
///
/// ```
/// use forkcompare_core::compare::truncate_to_budget;
///
/// assert_eq!(truncate_to_budget(b"abcdef".to_vec(), 4), b"abcd".to_vec());
/// assert_eq!(truncate_to_budget(b"ab".to_vec(), 4), b"ab".to_vec());
/// ```
pub fn truncate_to_budget(mut text: Vec<u8>, budget: usize) -> Vec<u8> {
    text.truncate(budget);
    text
}

pub(crate) fn serialize_lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

pub struct CompareEngine<'a> {
    limits: &'a CompareLimits,
}

impl<'a> CompareEngine<'a> {
    pub fn new(limits: &'a CompareLimits) -> Self {
        Self { limits }
    }

    /// Resolves both refs and compares them.
    ///
    /// `base_git` and `head_git` may be the same handle.
    pub async fn compare(
        &self,
        base_git: &dyn GitRepository,
        base_repo: &Repository,
        base_ref: &str,
        head_git: &dyn GitRepository,
        head_ref: &str,
        page: PageRequest,
    ) -> Result<CompareOutcome, CompareError> {
        let base = RefKindResolver::new(base_git).resolve(base_ref).await?;
        let head = RefKindResolver::new(head_git).resolve(head_ref).await?;

        self.compare_refs(head_git, base_repo, &base, &head, page).await
    }

    /// Compares two resolved refs through the head handle.
    ///
    /// # Errors
    ///
    /// `ServerError` when the merge base, the commit range or the diff cannot
    /// be computed. Unresolved refs are `NotFound`.
    pub async fn compare_refs(
        &self,
        head_git: &dyn GitRepository,
        base_repo: &Repository,
        base: &RefSpec,
        head: &RefSpec,
        page: PageRequest,
    ) -> Result<CompareOutcome, CompareError> {
        let (base_qualified, base_commit_id) = resolved_parts(base)?;
        let (head_qualified, head_commit_id) = resolved_parts(head)?;
        let options = self.limits.normalize(page);

        let info = head_git
            .compare_info(base_repo, &base_qualified, &head_qualified, options)
            .await
            .map_err(|e| {
                error!(
                    repository_owner = base_repo.owner_name.as_str(),
                    repository = base_repo.name.as_str(),
                    base = base_qualified.as_str(),
                    head = head_qualified.as_str(),
                    error = %e,
                    "Failed to compute the comparison",
                );
                CompareError::ServerError(format!("compare {}...{}: {}", base.raw(), head.raw(), e))
            })?;

        if head_commit_id == info.merge_base {
            debug!(
                repository_owner = base_repo.owner_name.as_str(),
                repository = base_repo.name.as_str(),
                merge_base = info.merge_base.as_str(),
                "Head is at the merge base, nothing to compare",
            );
            return Ok(CompareOutcome {
                merge_base: info.merge_base,
                base_commit_id,
                head_commit_id,
                commits: Vec::new(),
                total_commits: 0,
                num_files: 0,
                diff: Vec::new(),
                nothing_to_compare: true,
                diff_unavailable: false,
            });
        }

        let raw = head_git
            .raw_diff(
                &base_commit_id,
                &head_commit_id,
                RawDiffKind::Diff,
                self.limits.max_diff_bytes,
            )
            .await
            .map_err(|e| CompareError::ServerError(format!("raw diff: {}", e)))?;
        let diff_unavailable = raw.is_empty();
        if raw.len() > self.limits.max_diff_bytes {
            debug!(
                budget = self.limits.max_diff_bytes,
                "Truncated diff text",
            );
        }
        let diff = truncate_to_budget(raw, self.limits.max_diff_bytes);

        Ok(CompareOutcome {
            merge_base: info.merge_base,
            base_commit_id,
            head_commit_id,
            commits: info.commits,
            total_commits: info.total_commits,
            num_files: info.num_files,
            diff,
            nothing_to_compare: false,
            diff_unavailable,
        })
    }
}

fn resolved_parts(spec: &RefSpec) -> Result<(String, String), CompareError> {
    match (spec.qualified(), spec.commit_id()) {
        (Some(qualified), Some(commit_id)) => Ok((qualified, commit_id.to_string())),
        _ => Err(CompareError::NotFound(format!("reference '{}'", spec.raw()))),
    }
}
