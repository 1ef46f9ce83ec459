//! # Local git backend
//!
//! A [`GitBackend`] over repositories stored on the local filesystem, read
//! through libgit2.
//!
//! Repositories live at `<root>/<owner>/<name>.git` (lower-cased). Comparisons
//! across two repositories attach the base repository's object database to the
//! head handle as an in-memory alternate, so neither repository is modified.
//! All libgit2 calls run on the blocking thread pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use git2::{BranchType, DiffFormat, ErrorCode, Oid, Sort};
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::models::{CompareInfo, Commit, ListOptions, RawDiffKind, Repository, Signature};
use crate::{GitBackend, GitRepository};

#[cfg(test)]
#[path = "local_git_tests.rs"]
mod tests;

/// Opens repositories below a storage root.
#[derive(Debug, Clone)]
pub struct LocalGitBackend {
    root: PathBuf,
}

impl LocalGitBackend {
    /// Creates a backend serving repositories below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the repository owned by `owner` and called `name`.
    pub fn repository_path(&self, owner: &str, name: &str) -> PathBuf {
        repository_path(&self.root, owner, name)
    }
}

#[async_trait]
impl GitBackend for LocalGitBackend {
    #[instrument(skip(self, repo), fields(repository_owner = %repo.owner_name, repository = %repo.name))]
    async fn open_repository(&self, repo: &Repository) -> Result<Box<dyn GitRepository>, Error> {
        let path = self.repository_path(&repo.owner_name, &repo.name);
        let open_path = path.clone();

        let opened = tokio::task::spawn_blocking(move || git2::Repository::open(&open_path))
            .await
            .map_err(|e| Error::GitOperationFailed(format!("open {}: {}", repo.full_name(), e)))?;

        let inner = opened.map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                Error::RepositoryNotFound(repo.owner_name.clone(), repo.name.clone())
            } else {
                Error::GitOperationFailed(format!("open {}: {}", repo.full_name(), e.message()))
            }
        })?;

        debug!(path = ?path, "Opened repository handle");

        Ok(Box::new(LocalGitRepository {
            root: self.root.clone(),
            path,
            inner: Arc::new(Mutex::new(inner)),
        }))
    }
}

/// An open handle on a local repository. Released on drop.
pub struct LocalGitRepository {
    root: PathBuf,
    path: PathBuf,
    inner: Arc<Mutex<git2::Repository>>,
}

impl LocalGitRepository {
    /// Runs `f` against the repository on the blocking thread pool.
    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&git2::Repository) -> Result<T, Error> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || {
            let repo = inner.lock().map_err(|_| {
                Error::GitOperationFailed(format!("{}: repository handle is poisoned", operation))
            })?;
            f(&*repo)
        })
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                Error::Cancelled(operation.to_string())
            } else {
                Error::GitOperationFailed(format!("{}: {}", operation, e))
            }
        })?
    }
}

impl Drop for LocalGitRepository {
    fn drop(&mut self) {
        debug!(path = ?self.path, "Released repository handle");
    }
}

#[async_trait]
impl GitRepository for LocalGitRepository {
    async fn is_commit_exist(&self, id: &str) -> Result<bool, Error> {
        if !is_full_commit_id(id) {
            return Ok(false);
        }
        let id = id.to_string();

        self.run("is_commit_exist", move |repo| {
            let oid = Oid::from_str(&id)?;
            match repo.find_commit(oid) {
                Ok(_) => Ok(true),
                Err(e) if is_missing(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn is_branch_exist(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();

        self.run("is_branch_exist", move |repo| {
            match repo.find_branch(&name, BranchType::Local) {
                Ok(_) => Ok(true),
                Err(e) if is_missing(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn is_tag_exist(&self, name: &str) -> Result<bool, Error> {
        let reference = format!("refs/tags/{}", name);

        self.run("is_tag_exist", move |repo| match repo.find_reference(&reference) {
            Ok(_) => Ok(true),
            Err(e) if is_missing(&e) => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn find_commit_by_prefix(&self, prefix: &str) -> Result<Option<String>, Error> {
        let prefix = prefix.to_string();

        self.run("find_commit_by_prefix", move |repo| {
            match repo.find_commit_by_prefix(&prefix) {
                Ok(commit) => Ok(Some(commit.id().to_string())),
                Err(e) if is_missing(&e) || e.code() == ErrorCode::Ambiguous => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn branch_commit_id(&self, name: &str) -> Result<String, Error> {
        let name = name.to_string();

        self.run("branch_commit_id", move |repo| {
            let branch = repo.find_branch(&name, BranchType::Local)?;
            let commit = branch.get().peel_to_commit()?;
            Ok(commit.id().to_string())
        })
        .await
    }

    async fn tag_commit_id(&self, name: &str) -> Result<String, Error> {
        let reference = format!("refs/tags/{}", name);

        self.run("tag_commit_id", move |repo| {
            let commit = repo.find_reference(&reference)?.peel_to_commit()?;
            Ok(commit.id().to_string())
        })
        .await
    }

    async fn branches(&self) -> Result<Vec<String>, Error> {
        self.run("branches", |repo| {
            let mut names = Vec::new();
            for entry in repo.branches(Some(BranchType::Local))? {
                let (branch, _) = entry?;
                if let Some(name) = branch.name()? {
                    names.push(name.to_string());
                }
            }
            names.sort();
            Ok(names)
        })
        .await
    }

    #[instrument(skip(self, base_repo), fields(base_repository = %base_repo.full_name()))]
    async fn compare_info(
        &self,
        base_repo: &Repository,
        base_ref: &str,
        head_ref: &str,
        options: ListOptions,
    ) -> Result<CompareInfo, Error> {
        let base_path = repository_path(&self.root, &base_repo.owner_name, &base_repo.name);
        let is_same_location = base_path == self.path;
        let base_ref = base_ref.to_string();
        let head_ref = head_ref.to_string();

        self.run("compare_info", move |repo| {
            let base_oid = if is_same_location {
                resolve_commit(repo, &base_ref)?
            } else {
                let base = git2::Repository::open(&base_path)?;
                let oid = resolve_commit(&base, &base_ref)?;
                attach_objects(repo, &base)?;
                oid
            };
            let head_oid = resolve_commit(repo, &head_ref)?;

            let merge_base = repo.merge_base(base_oid, head_oid).map_err(|e| {
                Error::GitOperationFailed(format!(
                    "merge-base {}...{}: {}",
                    base_ref,
                    head_ref,
                    e.message()
                ))
            })?;

            let mut walk = repo.revwalk()?;
            walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
            walk.push(head_oid)?;
            walk.hide(merge_base)?;
            let ids = walk.collect::<Result<Vec<Oid>, git2::Error>>()?;

            let commits = ids
                .iter()
                .skip(options.offset())
                .take(options.page_size as usize)
                .map(|oid| -> Result<Commit, Error> {
                    let commit = repo.find_commit(*oid)?;
                    convert_commit(&commit)
                })
                .collect::<Result<Vec<Commit>, Error>>()?;

            let base_tree = repo.find_commit(merge_base)?.tree()?;
            let head_tree = repo.find_commit(head_oid)?.tree()?;
            let diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)?;

            Ok(CompareInfo {
                merge_base: merge_base.to_string(),
                commits,
                total_commits: ids.len() as u64,
                num_files: diff.deltas().len() as u64,
            })
        })
        .await
    }

    async fn raw_diff(
        &self,
        base_commit: &str,
        head_commit: &str,
        kind: RawDiffKind,
        max_bytes: usize,
    ) -> Result<Vec<u8>, Error> {
        let base_commit = base_commit.to_string();
        let head_commit = head_commit.to_string();

        self.run("raw_diff", move |repo| {
            let base_oid = Oid::from_str(&base_commit)?;
            let head_oid = Oid::from_str(&head_commit)?;

            match kind {
                RawDiffKind::Diff => unified_diff(repo, base_oid, head_oid, max_bytes),
                RawDiffKind::Patch => mailbox_patches(repo, base_oid, head_oid, max_bytes),
            }
        })
        .await
    }
}

fn attach_objects(repo: &git2::Repository, base: &git2::Repository) -> Result<(), Error> {
    let objects = base.path().join("objects");
    let objects = objects.to_str().ok_or_else(|| {
        Error::GitOperationFailed(format!("object directory {:?} is not valid UTF-8", objects))
    })?;
    repo.odb()?.add_disk_alternate(objects)?;
    Ok(())
}

fn convert_commit(commit: &git2::Commit<'_>) -> Result<Commit, Error> {
    Ok(Commit {
        id: commit.id().to_string(),
        author: convert_signature(&commit.author())?,
        committer: convert_signature(&commit.committer())?,
        message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
        tree_id: commit.tree_id().to_string(),
        parent_ids: commit.parent_ids().map(|id| id.to_string()).collect(),
    })
}

fn convert_signature(signature: &git2::Signature<'_>) -> Result<Signature, Error> {
    let time = signature.when();
    let invalid = || {
        Error::GitOperationFailed(format!(
            "invalid signature time {} {:+}",
            time.seconds(),
            time.offset_minutes()
        ))
    };

    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).ok_or_else(invalid)?;
    let when = DateTime::from_timestamp(time.seconds(), 0)
        .ok_or_else(invalid)?
        .with_timezone(&offset);

    Ok(Signature {
        name: String::from_utf8_lossy(signature.name_bytes()).into_owned(),
        email: String::from_utf8_lossy(signature.email_bytes()).into_owned(),
        when,
    })
}

fn is_full_commit_id(id: &str) -> bool {
    (id.len() == 40 || id.len() == 64) && id.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_missing(err: &git2::Error) -> bool {
    matches!(
        err.code(),
        ErrorCode::NotFound | ErrorCode::InvalidSpec | ErrorCode::Invalid
    )
}

fn mailbox_patches(
    repo: &git2::Repository,
    base: Oid,
    head: Oid,
    max_bytes: usize,
) -> Result<Vec<u8>, Error> {
    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
    walk.push(head)?;
    walk.hide(base)?;

    let limit = max_bytes.saturating_add(1);
    let mut buffer = Vec::new();
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        // libgit2 cannot format merge commits as patches
        if commit.parent_count() > 1 {
            continue;
        }
        let email = git2::Email::from_commit(&commit, &mut git2::EmailCreateOptions::new())?;
        append_capped(&mut buffer, email.as_slice(), limit);
        if buffer.len() >= limit {
            break;
        }
    }

    Ok(buffer)
}

/// Appends as much of `bytes` as fits below `limit`.
fn append_capped(buffer: &mut Vec<u8>, bytes: &[u8], limit: usize) {
    let room = limit.saturating_sub(buffer.len());
    buffer.extend_from_slice(&bytes[..bytes.len().min(room)]);
}

fn repository_path(root: &Path, owner: &str, name: &str) -> PathBuf {
    root.join(owner.to_lowercase())
        .join(format!("{}.git", name.to_lowercase()))
}

fn resolve_commit(repo: &git2::Repository, spec: &str) -> Result<Oid, Error> {
    let commit = repo.revparse_single(spec)?.peel_to_commit()?;
    Ok(commit.id())
}

fn unified_diff(
    repo: &git2::Repository,
    base: Oid,
    head: Oid,
    max_bytes: usize,
) -> Result<Vec<u8>, Error> {
    let base_tree = repo.find_commit(base)?.tree()?;
    let head_tree = repo.find_commit(head)?.tree()?;
    let diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)?;

    let limit = max_bytes.saturating_add(1);
    let mut buffer = Vec::new();
    let printed = diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            append_capped(&mut buffer, &[line.origin() as u8], limit);
        }
        append_capped(&mut buffer, line.content(), limit);
        buffer.len() < limit
    });

    match printed {
        Ok(()) => Ok(buffer),
        // The callback stops the walk once the budget is exceeded.
        Err(_) if buffer.len() >= limit => Ok(buffer),
        Err(e) => Err(e.into()),
    }
}
