use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

use crate::common::{OutputMode, validator};

async fn mount_json(server: &MockServer, endpoint: &str, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// Everything the tests don't explicitly mock is absent.
async fn mount_not_found(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(server)
        .await;
}

async fn mount_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", "Bearer ghp_test"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-oauth-scopes", "repo, gist")
                .insert_header("x-accepted-oauth-scopes", "")
                .set_body_json(json!({
                    "login": "octocat",
                    "id": 1,
                    "type": "User",
                    "name": "The Octocat",
                    "email": "octocat@github.com",
                })),
        )
        .mount(server)
        .await;
}

async fn mount_rate_limit(server: &MockServer) {
    let core = json!({"limit": 5000, "remaining": 4000, "reset": 0, "used": 1000});
    mount_json(
        server,
        "/rate_limit",
        200,
        json!({
            "resources": {
                "core": core,
                "search": {"limit": 30, "remaining": 28, "reset": 0, "used": 2},
            },
            "rate": core,
        }),
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_authentication_failure() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_not_found(&server).await;

    let output = validator()
        .base_url(server.uri())
        .expects_failure(true)
        .output(OutputMode::Stderr)
        .run()?;

    assert!(output.contains("fatal: no validation was performed"), "{output}");
    assert!(
        output.contains("authentication failed: GitHub rejected the API key"),
        "{output}"
    );
    // Nothing past the authentication check ran.
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validate_json() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_user(&server).await;
    mount_rate_limit(&server).await;
    mount_json(&server, "/user/repos", 200, json!([])).await;
    mount_json(
        &server,
        "/user/emails",
        200,
        json!([{"email": "octocat@github.com", "primary": true, "verified": true}]),
    )
    .await;
    mount_not_found(&server).await;

    let output = validator()
        .base_url(server.uri())
        .args(["--format", "json"])
        .run()?;
    let report = serde_json::from_str::<Value>(&output)?;

    assert_eq!(report["summary"]["total_tested"], 60);
    assert_eq!(report["authenticated_user"]["login"], "octocat");
    assert_eq!(report["rate_limit"]["remaining"], 4000);

    let critical = &report["critical_permissions"];
    assert_eq!(critical.as_object().map(|tier| tier.len()), Some(27));
    assert!(critical.get("repo").is_some());

    // Tiers keep their probing order in the emitted document.
    let position = |key: &str| output.find(&format!("\"{key}\": {{"));
    assert!(position("repo").is_some());
    assert!(position("repo") < position("admin:org"));
    assert!(position("admin:org") < position("read:user"));
    assert!(report.get("creation_test").is_none());

    let read_user = &report["standard_permissions"]["read:user"];
    assert_eq!(read_user["granted"], true);
    assert_eq!(read_user["confidence"], "exact");

    let emails = &report["standard_permissions"]["user:email"];
    assert_eq!(emails["granted"], true);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validate_with_creation_test() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_user(&server).await;
    mount_rate_limit(&server).await;
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"full_name": "octocat/throwaway"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/octocat/throwaway/topics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"names": ["github-validator"]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/octocat/throwaway"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_not_found(&server).await;

    let output = validator()
        .base_url(server.uri())
        .args(["--creation-test", "--format", "json"])
        .run()?;
    let report = serde_json::from_str::<Value>(&output)?;

    assert_eq!(
        report["creation_test"],
        json!({
            "result": "success",
            "message": "Repository creation succeeded",
            "http_code": 201,
            "repository": "octocat/throwaway",
            "write_confirmed": true,
            "cleaned_up": true,
        })
    );
    assert_eq!(report["summary"]["total_tested"], 60);

    Ok(())
}

/// An explicit base URL wins over a hostname from the environment.
#[tokio::test(flavor = "multi_thread")]
async fn test_base_url_overrides_gh_host() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_user(&server).await;
    mount_rate_limit(&server).await;
    mount_not_found(&server).await;

    let output = validator()
        .setenv("GH_HOST", "ghe.invalid")
        .base_url(server.uri())
        .args(["--rate-limit", "--format", "json"])
        .run()?;
    let status = serde_json::from_str::<Value>(&output)?;

    assert_eq!(status["core"]["remaining"], 4000);
    assert!(!server.received_requests().await.unwrap_or_default().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validate_honors_disabled_probes() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_user(&server).await;
    mount_rate_limit(&server).await;
    mount_not_found(&server).await;

    let config = std::env::temp_dir().join(format!(
        "github-validator-e2e-{pid}.yml",
        pid = std::process::id()
    ));
    std::fs::write(&config, "probes:\n  disable: [gist, notifications]\n")?;

    let output = validator()
        .base_url(server.uri())
        .config(config.to_string_lossy())
        .args(["--format", "json"])
        .run();
    std::fs::remove_file(&config)?;
    let report = serde_json::from_str::<Value>(&output?)?;

    assert_eq!(report["summary"]["total_tested"], 58);
    assert!(report["standard_permissions"].get("gist").is_none());
    assert!(report["standard_permissions"].get("notifications").is_none());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rate_limit_plain() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_user(&server).await;
    mount_rate_limit(&server).await;
    mount_not_found(&server).await;

    insta::assert_snapshot!(
        validator()
            .base_url(server.uri())
            .args(["--rate-limit"])
            .run()?,
        @r"
    Core: 4000/5000 remaining (20% used), healthy
    Search: 28/30 remaining

    note: Rate limit status is healthy. Continue normal operations.
    "
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_token_info_json() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_user(&server).await;
    mount_rate_limit(&server).await;
    mount_json(
        &server,
        "/user/installations",
        403,
        json!({"message": "You must authenticate with an access token authorized to a GitHub App"}),
    )
    .await;
    mount_not_found(&server).await;

    let output = validator()
        .base_url(server.uri())
        .args(["--token-info", "--format", "json"])
        .run()?;
    let metadata = serde_json::from_str::<Value>(&output)?;

    assert_eq!(metadata["scopes"], json!(["repo", "gist"]));
    assert_eq!(metadata["token_type"], "personal_access_token");
    assert_eq!(metadata["token_prefix_kind"], "classic_personal_access_token");
    assert_eq!(metadata["user"]["login"], "octocat");
    assert_eq!(metadata["rate_limit"]["limit"], 5000);
    assert_eq!(metadata["errors"], json!([]));

    Ok(())
}
