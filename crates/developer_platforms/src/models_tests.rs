use super::*;

fn create_test_repository(is_fork: bool, fork_id: Option<u64>) -> Repository {
    Repository {
        id: 2,
        owner_id: 20,
        owner_name: "bob".to_string(),
        name: "proj".to_string(),
        is_fork,
        fork_id,
        is_private: false,
    }
}

#[test]
fn test_access_mode_ordering() {
    assert!(AccessMode::None < AccessMode::Read);
    assert!(AccessMode::Read < AccessMode::Write);
    assert!(AccessMode::Write < AccessMode::Admin);
    assert!(AccessMode::Admin < AccessMode::Owner);
}

#[test]
fn test_access_mode_deserialization() {
    #[derive(Deserialize)]
    struct Wrapper {
        mode: AccessMode,
    }

    let wrapper: Wrapper = toml::from_str(r#"mode = "write""#).unwrap();
    assert_eq!(wrapper.mode, AccessMode::Write);
}

#[test]
fn test_list_options_offset() {
    assert_eq!(ListOptions { page: 1, page_size: 50 }.offset(), 0);
    assert_eq!(ListOptions { page: 3, page_size: 20 }.offset(), 40);
    assert_eq!(ListOptions { page: 0, page_size: 20 }.offset(), 0);
}

#[test]
fn test_permission_none_denies_everything() {
    let permission = RepoPermission::none();

    for unit in UnitType::all() {
        assert!(!permission.can_read(unit));
    }
    assert!(!permission.is_admin());
}

#[test]
fn test_permission_owner_allows_everything() {
    let permission = RepoPermission::owner();

    for unit in UnitType::all() {
        assert!(permission.can_read(unit));
    }
    assert!(permission.can_read_issues_or_pulls(true));
    assert!(permission.can_read_issues_or_pulls(false));
    assert!(permission.is_admin());
}

#[test]
fn test_permission_admin_ignores_unit_list() {
    let permission = RepoPermission {
        access_mode: AccessMode::Admin,
        units: Vec::new(),
    };

    assert!(permission.can_read(UnitType::PullRequests));
}

#[test]
fn test_permission_read_is_limited_to_units() {
    let permission = RepoPermission {
        access_mode: AccessMode::Read,
        units: vec![UnitType::Code, UnitType::Issues],
    };

    assert!(permission.can_read(UnitType::Code));
    assert!(permission.can_read_issues_or_pulls(false));
    assert!(!permission.can_read_issues_or_pulls(true));
}

#[test]
fn test_permission_units_without_access_mode() {
    let permission = RepoPermission {
        access_mode: AccessMode::None,
        units: UnitType::all().to_vec(),
    };

    assert!(!permission.can_read(UnitType::Code));
}

#[test]
fn test_pull_request_is_same_repo() {
    let pr = PullRequest {
        id: 1,
        index: 1,
        title: String::new(),
        base_repo_id: 5,
        base_branch: "main".to_string(),
        head_repo_id: 5,
        head_branch: "feature".to_string(),
        merge_base: "a".repeat(40),
        has_merged: false,
    };

    assert!(pr.is_same_repo());
}

#[test]
fn test_repository_full_name() {
    let repo = create_test_repository(false, None);

    assert_eq!(repo.full_name(), "bob/proj");
}

#[test]
fn test_repository_fork_parent_requires_fork_flag() {
    assert_eq!(create_test_repository(true, Some(1)).fork_parent_id(), Some(1));
    assert_eq!(create_test_repository(false, Some(1)).fork_parent_id(), None);
    assert_eq!(create_test_repository(true, None).fork_parent_id(), None);
}

#[test]
fn test_repository_deserialization_defaults() {
    let json = r#"{
        "id": 1,
        "owner_id": 10,
        "owner_name": "alice",
        "name": "proj"
    }"#;

    let repo: Repository = serde_json::from_str(json).unwrap();
    assert!(!repo.is_fork);
    assert_eq!(repo.fork_id, None);
    assert!(!repo.is_private);
}

#[test]
fn test_user_deserialization_defaults() {
    let json = r#"{ "id": 10, "login": "alice" }"#;

    let user: User = serde_json::from_str(json).unwrap();
    assert_eq!(user.login, "alice");
    assert!(user.email.is_empty());
    assert!(!user.is_admin);
}
