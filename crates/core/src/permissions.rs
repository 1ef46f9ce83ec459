//! Read-access checks for the repositories taking part in a comparison.
//!
//! A failed check is reported to callers as `NotFound`, indistinguishable
//! from a repository that does not exist. The denial itself is only logged.

use forkcompare_developer_platforms::models::{RepoPermission, Repository, UnitType, User};
use forkcompare_developer_platforms::AccessControl;
use tracing::debug;

use crate::errors::CompareError;

#[cfg(test)]
#[path = "permissions_tests.rs"]
mod tests;

pub struct PermissionGate<'a, A: AccessControl + ?Sized> {
    access: &'a A,
}

impl<'a, A: AccessControl + ?Sized> PermissionGate<'a, A> {
    pub fn new(access: &'a A) -> Self {
        Self { access }
    }

    async fn permission(
        &self,
        actor: Option<&User>,
        repo: &Repository,
    ) -> Result<RepoPermission, CompareError> {
        self.access
            .repo_permission(repo, actor)
            .await
            .map_err(|e| CompareError::ServerError(e.to_string()))
    }

    pub async fn can_read_code(
        &self,
        actor: Option<&User>,
        repo: &Repository,
    ) -> Result<bool, CompareError> {
        Ok(self.permission(actor, repo).await?.can_read(UnitType::Code))
    }

    pub async fn can_read_issues_or_pulls(
        &self,
        actor: Option<&User>,
        repo: &Repository,
        is_pull: bool,
    ) -> Result<bool, CompareError> {
        Ok(self
            .permission(actor, repo)
            .await?
            .can_read_issues_or_pulls(is_pull))
    }

    /// Requires code and pull request read access on the base repository.
    ///
    /// Returns the permission so callers can make further decisions (such as
    /// merging) without a second lookup.
    pub async fn authorize_base(
        &self,
        actor: Option<&User>,
        base: &Repository,
    ) -> Result<RepoPermission, CompareError> {
        let permission = self.permission(actor, base).await?;

        if !permission.can_read(UnitType::Code) {
            log_denial(actor, base, "code", &permission);
            return Err(CompareError::access_denied());
        }
        if !permission.can_read_issues_or_pulls(true) {
            log_denial(actor, base, "pull requests", &permission);
            return Err(CompareError::access_denied());
        }

        Ok(permission)
    }

    /// Requires code read access on the head repository when it differs from
    /// the base repository.
    pub async fn authorize_head(
        &self,
        actor: Option<&User>,
        base: &Repository,
        head: &Repository,
    ) -> Result<(), CompareError> {
        if head.id == base.id {
            return Ok(());
        }

        let permission = self.permission(actor, head).await?;
        if !permission.can_read(UnitType::Code) {
            log_denial(actor, head, "code", &permission);
            return Err(CompareError::access_denied());
        }

        Ok(())
    }
}

fn log_denial(actor: Option<&User>, repo: &Repository, unit: &str, permission: &RepoPermission) {
    debug!(
        actor = actor.map(|u| u.login.as_str()).unwrap_or("<anonymous>"),
        repository_owner = repo.owner_name.as_str(),
        repository = repo.name.as_str(),
        unit = unit,
        access_mode = ?permission.access_mode,
        "Permission denied",
    );
}
