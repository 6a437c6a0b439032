use std::path::{Path, PathBuf};

use github_rest_models::{
    actions::{Runner, RunnerList, Secret, SecretList, WorkflowList},
    apps::InstallationList,
    orgs::{Organization, Team},
    rate_limit::RateLimitOverview,
    repos::{Branch, Repository, RepositoryPermissions},
    users::{Email, User},
};
use pretty_assertions::assert_eq;
use serde::de::DeserializeOwned;

fn sample_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/sample-responses")
}

fn load<T: DeserializeOwned>(name: &str) -> T {
    let sample_path = sample_dir().join(name);
    let contents = std::fs::read_to_string(&sample_path)
        .unwrap_or_else(|err| panic!("failed to read {}: {err}", sample_path.display()));
    serde_json::from_str(&contents).unwrap()
}

#[test]
fn test_user() {
    let user: User = load("user.json");

    assert_eq!(user.login, "octocat");
    assert_eq!(user.kind, "User");
    assert_eq!(user.name.as_deref(), Some("monalisa octocat"));
    assert_eq!(user.email, None);
    assert!(!user.site_admin);
}

#[test]
fn test_user_minimal() {
    let user: User = serde_json::from_str("{}").unwrap();
    assert_eq!(user, User::default());
}

/// Listing items that omit their usual identifying fields still decode,
/// so one odd item never sinks a whole listing.
#[test]
fn test_partial_listing_items() {
    let repos: Vec<Repository> =
        serde_json::from_str(r#"[{"full_name": "octocat/one"}, {"id": 2}]"#).unwrap();
    assert_eq!(repos[0].full_name, "octocat/one");
    assert_eq!(repos[1].id, 2);
    assert_eq!(repos[1].full_name, "");
    assert_eq!(repos[1].default_branch_or_main(), "main");

    let orgs: Vec<Organization> = serde_json::from_str(r#"[{"id": 1}]"#).unwrap();
    assert_eq!(orgs[0].login, "");

    let teams: Vec<Team> = serde_json::from_str(r#"[{"slug": "core"}, {}]"#).unwrap();
    assert_eq!(teams[0].slug, "core");
    assert_eq!(teams[1], Team::default());

    let runners: Vec<Runner> = serde_json::from_str(r#"[{"name": "builder"}]"#).unwrap();
    assert_eq!(runners[0].id, 0);
    assert!(!runners[0].is_online());

    let secrets: Vec<Secret> =
        serde_json::from_str(r#"[{"created_at": "2024-01-01T00:00:00Z"}]"#).unwrap();
    assert_eq!(secrets[0].name, "");

    let workflows: WorkflowList =
        serde_json::from_str(r#"{"total_count": 1, "workflows": [{"path": "ci.yml"}]}"#).unwrap();
    assert_eq!(workflows.workflows[0].id, 0);

    let installations: InstallationList =
        serde_json::from_str(r#"{"installations": [{"account": {"type": "User"}}]}"#).unwrap();
    let account = installations.installations[0].account.as_ref().unwrap();
    assert_eq!(account.login, "");

    let branches: Vec<Branch> = serde_json::from_str(r#"[{"protected": true}]"#).unwrap();
    assert!(branches[0].protected);

    let emails: Vec<Email> = serde_json::from_str(r#"[{"primary": true}]"#).unwrap();
    assert_eq!(emails[0].email, "");
}

#[test]
fn test_repositories() {
    let repos: Vec<Repository> = load("repos.json");
    assert_eq!(repos.len(), 3);

    let hello = &repos[0];
    assert!(hello.is_admin());
    assert_eq!(hello.default_branch_or_main(), "master");

    let sauce = &repos[1];
    assert!(sauce.private);
    assert!(sauce.archived);
    assert!(!sauce.is_admin());
    assert_eq!(
        sauce.permissions,
        Some(RepositoryPermissions {
            pull: true,
            ..Default::default()
        })
    );

    let bare = &repos[2];
    assert_eq!(bare.full_name, "octocat/bare");
    assert_eq!(bare.default_branch_or_main(), "main");
    assert_eq!(bare.permissions, None);
    assert!(!bare.is_admin());
}

#[test]
fn test_runners() {
    let list: RunnerList = load("runners.json");
    assert_eq!(list.total_count, 2);

    let mbp = &list.runners[0];
    assert!(mbp.is_online());
    assert_eq!(
        mbp.label_names().collect::<Vec<_>>(),
        ["self-hosted", "X64", "appsec"]
    );
    assert_eq!(mbp.runner_group_id, Some(1));

    let imac = &list.runners[1];
    assert!(!imac.is_online());
    assert_eq!(imac.label_names().count(), 0);
}

#[test]
fn test_secrets() {
    let list: SecretList = load("secrets.json");
    assert_eq!(list.secrets.len(), 2);
    assert_eq!(list.secrets[0].visibility, None);
    assert_eq!(list.secrets[1].visibility.as_deref(), Some("private"));
}

#[test]
fn test_rate_limit() {
    let overview: RateLimitOverview = load("rate_limit.json");

    assert_eq!(overview.resources.core.remaining, 4999);
    assert_eq!(overview.resources.search.map(|s| s.limit), Some(30));
    assert_eq!(overview.resources.graphql.map(|g| g.used), Some(7));
    assert!(overview.resources.other.contains_key("integration_manifest"));
    assert_eq!(overview.rate.reset, 1372700873);
}

#[test]
fn test_installations() {
    let list: InstallationList = load("installations.json");
    let inst = &list.installations[0];

    assert_eq!(inst.app_slug, "octoapp");
    assert_eq!(inst.account.as_ref().map(|a| a.kind.as_str()), Some("Organization"));
}
