//! Conversion of git commits into API commit views.
//!
//! Author and committer emails are mapped to platform accounts. Lookups are
//! memoized in a [`UserCache`] that lives for one response assembly only.

use std::collections::HashMap;

use forkcompare_developer_platforms::models::{Commit, Repository, Signature, User};
use forkcompare_developer_platforms::AccountStore;
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::CompareError;

#[cfg(test)]
#[path = "enricher_tests.rs"]
mod tests;

/// Platform accounts resolved by email during one request.
///
/// Only accounts that were found are stored. An address without an account
/// is looked up again on its next occurrence.
#[derive(Debug, Default)]
pub struct UserCache {
    users: HashMap<String, User>,
}

impl UserCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, email: &str) -> Option<&User> {
        self.users.get(&email.to_ascii_lowercase())
    }

    pub fn insert(&mut self, email: &str, user: User) {
        self.users.insert(email.to_ascii_lowercase(), user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// A reference to another git object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitMeta {
    pub url: String,
    pub sha: String,
}

/// Identity recorded in the commit itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitUser {
    pub name: String,
    pub email: String,

    /// RFC 3339 timestamp with the recorded offset
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoCommit {
    pub url: String,
    pub author: CommitUser,
    pub committer: CommitUser,
    pub message: String,
    pub tree: CommitMeta,
}

/// A platform account as shown next to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: u64,
    pub login: String,
    pub full_name: String,
    pub email: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            login: user.login.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// A commit as exposed to API consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitView {
    pub url: String,
    pub sha: String,
    pub html_url: String,
    pub commit: RepoCommit,

    /// The account owning the author email, if there is one
    pub author: Option<UserView>,

    /// The account owning the committer email, if there is one
    pub committer: Option<UserView>,

    /// Parents in the order git declares them
    pub parents: Vec<CommitMeta>,
}

pub struct CommitEnricher<'a, A: AccountStore + ?Sized> {
    accounts: &'a A,
    app_url: &'a str,
}

impl<'a, A: AccountStore + ?Sized> CommitEnricher<'a, A> {
    pub fn new(accounts: &'a A, app_url: &'a str) -> Self {
        Self {
            accounts,
            app_url: app_url.trim_end_matches('/'),
        }
    }

    /// Builds the view of `commit` in `repo`.
    ///
    /// # Errors
    ///
    /// `ServerError` when the account store fails. A missing account is not an
    /// error; the corresponding field is left empty.
    pub async fn enrich(
        &self,
        repo: &Repository,
        commit: &Commit,
        cache: &mut UserCache,
    ) -> Result<CommitView, CompareError> {
        let author = self.lookup(&commit.author.email, cache).await?;
        let committer = self.lookup(&commit.committer.email, cache).await?;

        let api_base = self.api_repo_url(repo);
        let commit_url = format!("{}/git/commits/{}", api_base, commit.id);

        Ok(CommitView {
            url: commit_url.clone(),
            sha: commit.id.clone(),
            html_url: format!("{}/commit/{}", self.html_repo_url(repo), commit.id),
            commit: RepoCommit {
                url: commit_url,
                author: commit_user(&commit.author),
                committer: commit_user(&commit.committer),
                message: commit.message.clone(),
                tree: CommitMeta {
                    url: format!("{}/git/trees/{}", api_base, commit.tree_id),
                    sha: commit.tree_id.clone(),
                },
            },
            author: author.as_ref().map(UserView::from),
            committer: committer.as_ref().map(UserView::from),
            parents: commit
                .parent_ids
                .iter()
                .map(|id| CommitMeta {
                    url: format!("{}/git/commits/{}", api_base, id),
                    sha: id.clone(),
                })
                .collect(),
        })
    }

    /// Enriches `commits` in order, sharing `cache` between them.
    pub async fn enrich_all(
        &self,
        repo: &Repository,
        commits: &[Commit],
        cache: &mut UserCache,
    ) -> Result<Vec<CommitView>, CompareError> {
        let mut views = Vec::with_capacity(commits.len());
        for commit in commits {
            views.push(self.enrich(repo, commit, cache).await?);
        }
        Ok(views)
    }

    async fn lookup(&self, email: &str, cache: &mut UserCache) -> Result<Option<User>, CompareError> {
        if email.is_empty() {
            return Ok(None);
        }
        if let Some(user) = cache.get(email) {
            return Ok(Some(user.clone()));
        }

        match self.accounts.get_user_by_email(email).await {
            Ok(Some(user)) => {
                cache.insert(email, user.clone());
                Ok(Some(user))
            }
            Ok(None) => {
                debug!(email = email, "No account owns the commit email");
                Ok(None)
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => {
                warn!(email = email, error = %e, "Account lookup failed");
                Err(CompareError::ServerError(format!("account lookup: {}", e)))
            }
        }
    }

    fn api_repo_url(&self, repo: &Repository) -> String {
        format!(
            "{}/api/v1/repos/{}/{}",
            self.app_url,
            urlencoding::encode(&repo.owner_name),
            urlencoding::encode(&repo.name)
        )
    }

    fn html_repo_url(&self, repo: &Repository) -> String {
        format!(
            "{}/{}/{}",
            self.app_url,
            urlencoding::encode(&repo.owner_name),
            urlencoding::encode(&repo.name)
        )
    }
}

fn commit_user(signature: &Signature) -> CommitUser {
    CommitUser {
        name: signature.name.clone(),
        email: signature.email.clone(),
        date: signature.when.to_rfc3339(),
    }
}
