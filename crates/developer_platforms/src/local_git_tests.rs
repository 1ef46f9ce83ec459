use super::*;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    backend: LocalGitBackend,
    alice_proj: Repository,
    bob_proj: Repository,
    /// Tip of alice/proj main
    a: Oid,
    /// Merge base of main and bob's feature branch
    b: Oid,
    /// Tip of bob/proj feature
    c: Oid,
    /// First commit on bob's feature branch
    c1: Oid,
}

fn signature(email: &str) -> git2::Signature<'static> {
    git2::Signature::new("Test Author", email, &git2::Time::new(1_700_000_000, 60)).unwrap()
}

fn commit_file(
    repo: &git2::Repository,
    branch: &str,
    parent: Option<Oid>,
    file: &str,
    content: &str,
    email: &str,
) -> Oid {
    let parent_commit = parent.map(|p| repo.find_commit(p).unwrap());
    let parent_tree = parent_commit.as_ref().map(|c| c.tree().unwrap());
    let mut builder = repo.treebuilder(parent_tree.as_ref()).unwrap();
    let blob = repo.blob(content.as_bytes()).unwrap();
    builder.insert(file, blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let parents: Vec<&git2::Commit> = parent_commit.iter().collect();
    let sig = signature(email);
    repo.commit(
        Some(&format!("refs/heads/{}", branch)),
        &sig,
        &sig,
        &format!("Update {}", file),
        &tree,
        &parents,
    )
    .unwrap()
}

fn repository(id: u64, owner_id: u64, owner: &str, fork_id: Option<u64>) -> Repository {
    Repository {
        id,
        owner_id,
        owner_name: owner.to_string(),
        name: "proj".to_string(),
        is_fork: fork_id.is_some(),
        fork_id,
        is_private: false,
    }
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let backend = LocalGitBackend::new(dir.path());

    let alice_path = backend.repository_path("alice", "proj");
    let alice = git2::Repository::init_bare(&alice_path).unwrap();
    let root = commit_file(&alice, "main", None, "README.md", "hello\n", "alice@example.com");
    let b = commit_file(&alice, "main", Some(root), "README.md", "hello\nworld\n", "alice@example.com");
    alice
        .tag_lightweight("v1", &alice.find_object(b, None).unwrap(), false)
        .unwrap();

    let bob_path = backend.repository_path("bob", "proj");
    let bob = git2::Repository::init_bare(&bob_path).unwrap();
    bob.remote_anonymous(alice_path.to_str().unwrap())
        .unwrap()
        .fetch(&["+refs/heads/*:refs/heads/*"], None, None)
        .unwrap();

    let c1 = commit_file(&bob, "feature", Some(b), "feature.txt", "one\n", "bob@example.com");
    let c = commit_file(&bob, "feature", Some(c1), "feature.txt", "one\ntwo\n", "bob@example.com");

    let a = commit_file(&alice, "main", Some(b), "CHANGELOG.md", "v2\n", "alice@example.com");

    Fixture {
        _dir: dir,
        backend,
        alice_proj: repository(1, 10, "alice", None),
        bob_proj: repository(2, 20, "bob", Some(1)),
        a,
        b,
        c,
        c1,
    }
}

#[tokio::test]
async fn test_open_missing_repository() {
    let fixture = fixture();
    let missing = repository(3, 30, "carol", None);

    let err = match fixture.backend.open_repository(&missing).await {
        Ok(_) => panic!("opening a missing repository should fail"),
        Err(e) => e,
    };

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_ref_existence_checks() {
    let fixture = fixture();
    let repo = fixture
        .backend
        .open_repository(&fixture.alice_proj)
        .await
        .unwrap();

    assert!(repo.is_branch_exist("main").await.unwrap());
    assert!(!repo.is_branch_exist("feature").await.unwrap());
    assert!(repo.is_tag_exist("v1").await.unwrap());
    assert!(!repo.is_tag_exist("main").await.unwrap());
    assert!(repo.is_commit_exist(&fixture.a.to_string()).await.unwrap());
    assert!(!repo.is_commit_exist("main").await.unwrap());
    assert!(!repo.is_commit_exist(&"0".repeat(40)).await.unwrap());
}

#[tokio::test]
async fn test_commit_id_lookups() {
    let fixture = fixture();
    let repo = fixture
        .backend
        .open_repository(&fixture.alice_proj)
        .await
        .unwrap();

    assert_eq!(
        repo.branch_commit_id("main").await.unwrap(),
        fixture.a.to_string()
    );
    assert_eq!(repo.tag_commit_id("v1").await.unwrap(), fixture.b.to_string());

    let err = repo.branch_commit_id("nope").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_find_commit_by_prefix() {
    let fixture = fixture();
    let repo = fixture
        .backend
        .open_repository(&fixture.alice_proj)
        .await
        .unwrap();
    let full = fixture.a.to_string();

    assert_eq!(
        repo.find_commit_by_prefix(&full[..8]).await.unwrap(),
        Some(full.clone())
    );
    assert_eq!(repo.find_commit_by_prefix("ffffffff").await.unwrap(), None);
}

#[tokio::test]
async fn test_branches_are_sorted() {
    let fixture = fixture();
    let repo = fixture
        .backend
        .open_repository(&fixture.bob_proj)
        .await
        .unwrap();

    assert_eq!(
        repo.branches().await.unwrap(),
        vec!["feature".to_string(), "main".to_string()]
    );
}

#[tokio::test]
async fn test_compare_info_across_forks() {
    let fixture = fixture();
    let head = fixture
        .backend
        .open_repository(&fixture.bob_proj)
        .await
        .unwrap();

    let info = head
        .compare_info(
            &fixture.alice_proj,
            "refs/heads/main",
            "refs/heads/feature",
            ListOptions {
                page: 1,
                page_size: 50,
            },
        )
        .await
        .unwrap();

    assert_eq!(info.merge_base, fixture.b.to_string());
    assert_eq!(info.total_commits, 2);
    assert_eq!(info.num_files, 1);
    let ids: Vec<String> = info.commits.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec![fixture.c.to_string(), fixture.c1.to_string()]);

    let tip = &info.commits[0];
    assert_eq!(tip.author.email, "bob@example.com");
    assert_eq!(tip.parent_ids, vec![fixture.c1.to_string()]);
    assert_eq!(tip.author.when.offset().local_minus_utc(), 3600);

    // The base tip only exists in alice/proj; the attached objects make it reachable.
    let diff = head
        .raw_diff(&fixture.a.to_string(), &fixture.c.to_string(), RawDiffKind::Diff, 1 << 20)
        .await
        .unwrap();
    let text = String::from_utf8(diff).unwrap();
    assert!(text.contains("diff --git a/CHANGELOG.md b/CHANGELOG.md"));
    assert!(text.contains("+two"));
}

#[tokio::test]
async fn test_compare_info_pagination() {
    let fixture = fixture();
    let head = fixture
        .backend
        .open_repository(&fixture.bob_proj)
        .await
        .unwrap();

    let info = head
        .compare_info(
            &fixture.alice_proj,
            "refs/heads/main",
            "refs/heads/feature",
            ListOptions {
                page: 2,
                page_size: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(info.total_commits, 2);
    assert_eq!(info.commits.len(), 1);
    assert_eq!(info.commits[0].id, fixture.c1.to_string());
}

#[tokio::test]
async fn test_compare_info_identical_refs() {
    let fixture = fixture();
    let repo = fixture
        .backend
        .open_repository(&fixture.alice_proj)
        .await
        .unwrap();

    let info = repo
        .compare_info(
            &fixture.alice_proj,
            "refs/heads/main",
            "refs/heads/main",
            ListOptions {
                page: 1,
                page_size: 50,
            },
        )
        .await
        .unwrap();

    assert_eq!(info.merge_base, fixture.a.to_string());
    assert_eq!(info.total_commits, 0);
    assert!(info.commits.is_empty());
}

#[tokio::test]
async fn test_raw_patch_has_one_mail_per_commit() {
    let fixture = fixture();
    let head = fixture
        .backend
        .open_repository(&fixture.bob_proj)
        .await
        .unwrap();

    let patch = head
        .raw_diff(&fixture.b.to_string(), &fixture.c.to_string(), RawDiffKind::Patch, 1 << 20)
        .await
        .unwrap();
    let text = String::from_utf8(patch).unwrap();

    assert_eq!(text.matches("Subject: ").count(), 2);
    assert!(text.contains("feature.txt"));
}

#[tokio::test]
async fn test_raw_diff_stops_one_byte_past_budget() {
    let fixture = fixture();
    let head = fixture
        .backend
        .open_repository(&fixture.bob_proj)
        .await
        .unwrap();
    let (base, tip) = (fixture.b.to_string(), fixture.c.to_string());

    for kind in [RawDiffKind::Diff, RawDiffKind::Patch] {
        let full = head.raw_diff(&base, &tip, kind, 1 << 20).await.unwrap();
        assert!(full.len() > 16);

        for budget in [0, 1, 7, 16, full.len() - 1] {
            let capped = head.raw_diff(&base, &tip, kind, budget).await.unwrap();

            assert_eq!(capped.len(), budget + 1, "{:?} budget {}", kind, budget);
            assert_eq!(&full[..capped.len()], capped.as_slice());
        }

        let exact = head.raw_diff(&base, &tip, kind, full.len()).await.unwrap();
        assert_eq!(exact, full);
    }
}

#[test]
fn test_repository_path_is_lower_cased() {
    let backend = LocalGitBackend::new("/srv/git");

    assert_eq!(
        backend.repository_path("Alice", "Proj"),
        PathBuf::from("/srv/git/alice/proj.git")
    );
}

#[test]
fn test_is_full_commit_id() {
    assert!(is_full_commit_id(&"a".repeat(40)));
    assert!(is_full_commit_id(&"0".repeat(64)));
    assert!(!is_full_commit_id(&"a".repeat(39)));
    assert!(!is_full_commit_id(&"g".repeat(40)));
}
