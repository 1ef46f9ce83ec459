//! Hand-written collaborators shared by the unit tests.
//!
//! `MockGitBackend` keeps one commit graph shared by every repository and a
//! set of refs per repository. `CountingCatalog` wraps a `StaticCatalog` and
//! counts email lookups.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use forkcompare_developer_platforms::catalog::StaticCatalog;
use forkcompare_developer_platforms::errors::Error;
use forkcompare_developer_platforms::models::{
    CompareInfo, Commit, ListOptions, PullRequest, RawDiffKind, RepoPermission, Repository,
    Signature, User,
};
use forkcompare_developer_platforms::{
    AccessControl, AccountStore, GitBackend, GitRepository, PullRequestStore, RepositoryStore,
};

/// A 40 character commit id derived from a small number.
pub fn commit_id(n: u8) -> String {
    format!("{:02x}", n).repeat(20)
}

pub fn signature(email: &str) -> Signature {
    Signature {
        name: email.split('@').next().unwrap_or_default().to_string(),
        email: email.to_string(),
        when: DateTime::parse_from_rfc3339("2024-05-01T12:00:00+02:00").unwrap(),
    }
}

#[derive(Default)]
struct RepoRefs {
    branches: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    objects: HashSet<String>,
}

#[derive(Default)]
struct World {
    commits: HashMap<String, Commit>,
    repos: HashMap<u64, RepoRefs>,
    diffs: HashMap<(String, String), Vec<u8>>,
    patches: HashMap<(String, String), Vec<u8>>,
}

/// Counts handle opens and releases.
#[derive(Default)]
pub struct HandleCounters {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
}

impl HandleCounters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[derive(Default, Clone)]
pub struct MockGitBackend {
    world: Arc<Mutex<World>>,
    pub counters: Arc<HandleCounters>,
    pub fail_compare: Arc<AtomicBool>,
    pub compare_calls: Arc<AtomicUsize>,
    pub diff_calls: Arc<AtomicUsize>,
}

impl MockGitBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a commit to the shared graph and makes it visible in `repos`.
    pub fn commit(&self, repos: &[u64], id: &str, parents: &[&str], email: &str) {
        let mut world = self.world.lock().unwrap();
        world.commits.insert(
            id.to_string(),
            Commit {
                id: id.to_string(),
                author: signature(email),
                committer: signature(email),
                message: format!("Commit {}\n", &id[..8]),
                tree_id: format!("{}{}", &id[..2], "ee".repeat(19)),
                parent_ids: parents.iter().map(|p| p.to_string()).collect(),
            },
        );
        for repo_id in repos {
            world
                .repos
                .entry(*repo_id)
                .or_default()
                .objects
                .insert(id.to_string());
        }
    }

    pub fn branch(&self, repo_id: u64, name: &str, id: &str) {
        let mut world = self.world.lock().unwrap();
        world
            .repos
            .entry(repo_id)
            .or_default()
            .branches
            .insert(name.to_string(), id.to_string());
    }

    pub fn tag(&self, repo_id: u64, name: &str, id: &str) {
        let mut world = self.world.lock().unwrap();
        world
            .repos
            .entry(repo_id)
            .or_default()
            .tags
            .insert(name.to_string(), id.to_string());
    }

    pub fn diff(&self, base: &str, head: &str, text: &[u8]) {
        let mut world = self.world.lock().unwrap();
        world
            .diffs
            .insert((base.to_string(), head.to_string()), text.to_vec());
    }

    pub fn patch(&self, base: &str, head: &str, text: &[u8]) {
        let mut world = self.world.lock().unwrap();
        world
            .patches
            .insert((base.to_string(), head.to_string()), text.to_vec());
    }
}

#[async_trait]
impl GitBackend for MockGitBackend {
    async fn open_repository(&self, repo: &Repository) -> Result<Box<dyn GitRepository>, Error> {
        if !self.world.lock().unwrap().repos.contains_key(&repo.id) {
            return Err(Error::RepositoryNotFound(
                repo.owner_name.clone(),
                repo.name.clone(),
            ));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockRepoHandle {
            repo_id: repo.id,
            backend: self.clone(),
        }))
    }
}

pub struct MockRepoHandle {
    repo_id: u64,
    backend: MockGitBackend,
}

impl Drop for MockRepoHandle {
    fn drop(&mut self) {
        self.backend.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl MockRepoHandle {
    fn with_refs<T>(&self, f: impl FnOnce(&World, &RepoRefs) -> T) -> T {
        let world = self.backend.world.lock().unwrap();
        f(&world, &world.repos[&self.repo_id])
    }
}

fn resolve(refs: &RepoRefs, spec: &str) -> Result<String, Error> {
    if let Some(name) = spec.strip_prefix("refs/heads/") {
        return refs
            .branches
            .get(name)
            .cloned()
            .ok_or_else(|| Error::RefNotFound(spec.to_string()));
    }
    if let Some(name) = spec.strip_prefix("refs/tags/") {
        return refs
            .tags
            .get(name)
            .cloned()
            .ok_or_else(|| Error::RefNotFound(spec.to_string()));
    }
    if refs.objects.contains(spec) {
        return Ok(spec.to_string());
    }
    Err(Error::RefNotFound(spec.to_string()))
}

/// Ancestors of `id` including itself, newest first.
fn ancestors(world: &World, id: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([id.to_string()]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(commit) = world.commits.get(&current) {
            queue.extend(commit.parent_ids.iter().cloned());
        }
        order.push(current);
    }
    order
}

#[async_trait]
impl GitRepository for MockRepoHandle {
    async fn is_commit_exist(&self, id: &str) -> Result<bool, Error> {
        Ok(self.with_refs(|_, refs| refs.objects.contains(id)))
    }

    async fn is_branch_exist(&self, name: &str) -> Result<bool, Error> {
        Ok(self.with_refs(|_, refs| refs.branches.contains_key(name)))
    }

    async fn is_tag_exist(&self, name: &str) -> Result<bool, Error> {
        Ok(self.with_refs(|_, refs| refs.tags.contains_key(name)))
    }

    async fn find_commit_by_prefix(&self, prefix: &str) -> Result<Option<String>, Error> {
        let prefix = prefix.to_ascii_lowercase();
        Ok(self.with_refs(|_, refs| {
            let matches: Vec<&String> = refs
                .objects
                .iter()
                .filter(|id| id.starts_with(&prefix))
                .collect();
            match matches.as_slice() {
                [only] => Some((*only).clone()),
                _ => None,
            }
        }))
    }

    async fn branch_commit_id(&self, name: &str) -> Result<String, Error> {
        self.with_refs(|_, refs| resolve(refs, &format!("refs/heads/{}", name)))
    }

    async fn tag_commit_id(&self, name: &str) -> Result<String, Error> {
        self.with_refs(|_, refs| resolve(refs, &format!("refs/tags/{}", name)))
    }

    async fn branches(&self) -> Result<Vec<String>, Error> {
        Ok(self.with_refs(|_, refs| refs.branches.keys().cloned().collect()))
    }

    async fn compare_info(
        &self,
        base_repo: &Repository,
        base_ref: &str,
        head_ref: &str,
        options: ListOptions,
    ) -> Result<CompareInfo, Error> {
        self.backend.compare_calls.fetch_add(1, Ordering::SeqCst);
        if self.backend.fail_compare.load(Ordering::SeqCst) {
            return Err(Error::GitOperationFailed("merge-base failed".to_string()));
        }

        let world = self.backend.world.lock().unwrap();
        let base_refs = world
            .repos
            .get(&base_repo.id)
            .ok_or_else(|| Error::RepositoryIdNotFound(base_repo.id))?;
        let base = resolve(base_refs, base_ref)?;
        let head = resolve(&world.repos[&self.repo_id], head_ref)?;

        let base_ancestors: HashSet<String> = ancestors(&world, &base).into_iter().collect();
        let head_ancestors = ancestors(&world, &head);
        let merge_base = head_ancestors
            .iter()
            .find(|id| base_ancestors.contains(*id))
            .cloned()
            .ok_or_else(|| Error::GitOperationFailed("no merge base".to_string()))?;

        let hidden: HashSet<String> = ancestors(&world, &merge_base).into_iter().collect();
        let range: Vec<&String> = head_ancestors
            .iter()
            .filter(|id| !hidden.contains(*id))
            .collect();
        let commits = range
            .iter()
            .skip(options.offset())
            .take(options.page_size as usize)
            .map(|id| world.commits[*id].clone())
            .collect();

        Ok(CompareInfo {
            merge_base,
            commits,
            total_commits: range.len() as u64,
            num_files: range.len() as u64,
        })
    }

    async fn raw_diff(
        &self,
        base_commit: &str,
        head_commit: &str,
        kind: RawDiffKind,
        max_bytes: usize,
    ) -> Result<Vec<u8>, Error> {
        self.backend.diff_calls.fetch_add(1, Ordering::SeqCst);
        let world = self.backend.world.lock().unwrap();
        let key = (base_commit.to_string(), head_commit.to_string());
        let texts = match kind {
            RawDiffKind::Diff => &world.diffs,
            RawDiffKind::Patch => &world.patches,
        };
        let mut text = texts.get(&key).cloned().unwrap_or_default();
        text.truncate(max_bytes.saturating_add(1));
        Ok(text)
    }
}

/// A `StaticCatalog` that counts email lookups.
pub struct CountingCatalog {
    inner: StaticCatalog,
    pub email_lookups: AtomicUsize,
    pub fail_email_lookups: AtomicBool,
}

impl CountingCatalog {
    pub fn new(content: &str) -> Self {
        Self {
            inner: StaticCatalog::from_toml_str(content).unwrap(),
            email_lookups: AtomicUsize::new(0),
            fail_email_lookups: AtomicBool::new(false),
        }
    }

    pub fn email_lookups(&self) -> usize {
        self.email_lookups.load(Ordering::SeqCst)
    }

    pub async fn repo(&self, owner: &str, name: &str) -> Repository {
        self.inner
            .get_repository_by_owner_and_name(owner, name)
            .await
            .unwrap()
    }

    pub async fn user(&self, login: &str) -> User {
        self.inner.get_user_by_name(login).await.unwrap().unwrap()
    }
}

#[async_trait]
impl AccessControl for CountingCatalog {
    async fn repo_permission(
        &self,
        repo: &Repository,
        actor: Option<&User>,
    ) -> Result<RepoPermission, Error> {
        self.inner.repo_permission(repo, actor).await
    }
}

#[async_trait]
impl AccountStore for CountingCatalog {
    async fn get_user_by_name(&self, login: &str) -> Result<Option<User>, Error> {
        self.inner.get_user_by_name(login).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.email_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_email_lookups.load(Ordering::SeqCst) {
            return Err(Error::StoreFailure("account store unavailable".to_string()));
        }
        self.inner.get_user_by_email(email).await
    }
}

#[async_trait]
impl PullRequestStore for CountingCatalog {
    async fn find_unmerged_pull_request(
        &self,
        head_repo_id: u64,
        base_repo_id: u64,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<Option<PullRequest>, Error> {
        self.inner
            .find_unmerged_pull_request(head_repo_id, base_repo_id, head_branch, base_branch)
            .await
    }

    async fn get_pull_request_by_index(
        &self,
        base_repo_id: u64,
        index: u64,
    ) -> Result<PullRequest, Error> {
        self.inner.get_pull_request_by_index(base_repo_id, index).await
    }
}

#[async_trait]
impl RepositoryStore for CountingCatalog {
    async fn get_repository_by_owner_and_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Repository, Error> {
        self.inner.get_repository_by_owner_and_name(owner, name).await
    }

    async fn get_repository_by_id(&self, id: u64) -> Result<Repository, Error> {
        self.inner.get_repository_by_id(id).await
    }

    async fn find_fork(&self, owner_id: u64, repo_id: u64) -> Result<Option<Repository>, Error> {
        self.inner.find_fork(owner_id, repo_id).await
    }
}

/// Accounts, repositories and permissions used across the service tests.
///
/// - `alice/proj` is public; `bob/proj` forks it; `carol/proj` forks `bob/proj`.
/// - `alice/fork-of-bob` is alice's fork of `bob/proj`.
/// - `unrelated/proj` has no fork relation to anything.
/// - `alice/secret` is private, readable by dave for code only.
/// - `bob/hidden` is a private fork of `alice/proj`.
pub const CATALOG: &str = r#"
[[users]]
id = 10
login = "alice"
full_name = "Alice Liddell"
email = "alice@example.com"

[[users]]
id = 20
login = "bob"
email = "bob@example.com"

[[users]]
id = 30
login = "carol"
email = "carol@example.com"

[[users]]
id = 40
login = "unrelated"

[[users]]
id = 50
login = "dave"

[[users]]
id = 99
login = "root"
is_admin = true

[[repositories]]
id = 1
owner = "alice"
name = "proj"

[[repositories]]
id = 2
owner = "bob"
name = "proj"
fork_of = 1

[[repositories]]
id = 3
owner = "carol"
name = "proj"
fork_of = 2

[[repositories]]
id = 4
owner = "alice"
name = "fork-of-bob"
fork_of = 2

[[repositories]]
id = 5
owner = "unrelated"
name = "proj"

[[repositories]]
id = 6
owner = "alice"
name = "secret"
private = true

[[repositories]]
id = 7
owner = "bob"
name = "hidden"
fork_of = 1
private = true

[[collaborators]]
repository = "alice/secret"
user = "dave"
access = "read"
units = ["code"]

[[pull_requests]]
id = 100
index = 1
title = "Add feature"
base_repo_id = 1
base_branch = "main"
head_repo_id = 2
head_branch = "feature"
merge_base = "0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b"
"#;

/// Commits used by the end-to-end scenarios.
///
/// `alice/proj` main: R -> B -> A. `bob/proj` feature: B -> C1 -> C.
/// `unrelated/proj` main: U. `alice/secret` main: S.
pub struct Scenario {
    pub git: MockGitBackend,
    pub catalog: CountingCatalog,
    pub r: String,
    pub a: String,
    pub b: String,
    pub c1: String,
    pub c: String,
}

pub fn scenario() -> Scenario {
    let git = MockGitBackend::new();
    let (r, b, a, c1, c) = (
        commit_id(0x01),
        commit_id(0x0b),
        commit_id(0x0a),
        commit_id(0xc1),
        commit_id(0x0c),
    );

    let shared = [1, 2, 3, 4, 7];
    git.commit(&shared, &r, &[], "alice@example.com");
    git.commit(&shared, &b, &[&r], "alice@example.com");
    git.commit(&[1], &a, &[&b], "alice@example.com");
    git.commit(&[2, 3, 4], &c1, &[&b], "bob@example.com");
    git.commit(&[2, 3, 4], &c, &[&c1], "bob@example.com");
    for repo in [1, 7] {
        git.branch(repo, "main", if repo == 1 { &a } else { &b });
    }
    for repo in [2, 3, 4] {
        git.branch(repo, "main", &b);
        git.branch(repo, "feature", &c);
    }

    let u = commit_id(0x55);
    git.commit(&[5], &u, &[], "unrelated@example.com");
    git.branch(5, "main", &u);

    let s = commit_id(0x5e);
    git.commit(&[6], &s, &[], "alice@example.com");
    git.branch(6, "main", &s);

    git.diff(&a, &c, b"diff --git a/feature.txt b/feature.txt\n+two\n");
    git.diff(&b, &c, b"diff --git a/feature.txt b/feature.txt\n+one\n+two\n");
    git.patch(&b, &c, b"From c1\nSubject: [PATCH 1/2]\n\nFrom c\nSubject: [PATCH 2/2]\n");

    Scenario {
        git,
        catalog: CountingCatalog::new(CATALOG),
        r,
        a,
        b,
        c1,
        c,
    }
}

pub fn offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap()
}
