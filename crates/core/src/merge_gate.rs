//! Decides whether a pull request may be merged.
//!
//! A pull request that is not ready can only be merged with the force flag,
//! and only by a repository administrator. Every other failed condition
//! refuses the merge outright.

use forkcompare_developer_platforms::models::{AccessMode, PullRequest, RepoPermission, UnitType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
#[path = "merge_gate_tests.rs"]
mod tests;

/// Merge preconditions reported by the checks and protection collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReadiness {
    /// The pull request has been closed without merging
    #[serde(default)]
    pub is_closed: bool,

    /// The head can be merged into the base without conflicts
    #[serde(default)]
    pub can_auto_merge: bool,

    /// The pull request is marked as work in progress
    #[serde(default)]
    pub is_work_in_progress: bool,

    /// Why required checks or reviews block the merge; `None` when ready
    #[serde(default)]
    pub blocked_reason: Option<String>,
}

/// Why a merge was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MergeRefusal {
    #[error("User not allowed to merge pull request")]
    NotAllowed,

    #[error("Pull request has already been merged")]
    AlreadyMerged,

    #[error("Pull request cannot be merged automatically")]
    NotMergeable,

    #[error("Pull request is a work in progress")]
    WorkInProgress,

    #[error("Pull request is not ready to be merged: {0}")]
    NotReady(String),

    #[error("Only repository admin can merge if not all checks are ok (force merge)")]
    ForceMergeRequiresAdmin,
}

/// Outcome of the merge gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum MergeDecision {
    Allowed,
    /// Allowed only because an administrator forced it
    Forced,
    Refused(MergeRefusal),
}

impl MergeDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, MergeDecision::Refused(_))
    }
}

/// Returns `true` if the permission lets the actor merge into the base.
pub fn can_merge(permission: &RepoPermission) -> bool {
    permission.is_admin()
        || (permission.access_mode >= AccessMode::Write
            && permission.can_read(UnitType::Code)
            && permission.can_read(UnitType::PullRequests))
}

/// Applies the merge rules to one pull request.
///
/// # Examples
///
/// ```
/// use forkcompare_core::merge_gate::{authorize_merge, MergeDecision, MergeReadiness, MergeRefusal};
/// use forkcompare_developer_platforms::models::{AccessMode, PullRequest, RepoPermission, UnitType};
///
/// let pr = PullRequest {
///     id: 1,
///     index: 1,
///     title: String::new(),
///     base_repo_id: 1,
///     base_branch: "main".to_string(),
///     head_repo_id: 2,
///     head_branch: "feature".to_string(),
///     merge_base: "b".repeat(40),
///     has_merged: false,
/// };
/// let readiness = MergeReadiness {
///     can_auto_merge: true,
///     blocked_reason: Some("required check failed".to_string()),
///     ..MergeReadiness::default()
/// };
/// let writer = RepoPermission {
///     access_mode: AccessMode::Write,
///     units: UnitType::all().to_vec(),
/// };
///
/// assert_eq!(
///     authorize_merge(&pr, &readiness, &writer, true),
///     MergeDecision::Refused(MergeRefusal::ForceMergeRequiresAdmin)
/// );
/// ```
pub fn authorize_merge(
    pr: &PullRequest,
    readiness: &MergeReadiness,
    permission: &RepoPermission,
    force: bool,
) -> MergeDecision {
    if !can_merge(permission) {
        return MergeDecision::Refused(MergeRefusal::NotAllowed);
    }
    if pr.has_merged {
        return MergeDecision::Refused(MergeRefusal::AlreadyMerged);
    }
    if !readiness.can_auto_merge {
        return MergeDecision::Refused(MergeRefusal::NotMergeable);
    }
    if readiness.is_work_in_progress {
        return MergeDecision::Refused(MergeRefusal::WorkInProgress);
    }

    match &readiness.blocked_reason {
        None => MergeDecision::Allowed,
        Some(_) if force && permission.is_admin() => MergeDecision::Forced,
        Some(_) if force => MergeDecision::Refused(MergeRefusal::ForceMergeRequiresAdmin),
        Some(reason) => MergeDecision::Refused(MergeRefusal::NotReady(reason.clone())),
    }
}
