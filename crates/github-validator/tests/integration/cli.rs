use crate::common::validator;

fn first_lines(output: &str, count: usize) -> String {
    output.lines().take(count).collect::<Vec<_>>().join("\n")
}

#[test]
fn test_version() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        validator().api_key(None).args(["--version"]).run()?,
        @"github-validator @@VERSION@@"
    );

    Ok(())
}

/// `--validate`, `--token-info` and `--rate-limit` are mutually exclusive modes.
#[test]
fn test_modes_conflict() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        first_lines(
            &validator()
                .expects_failure(true)
                .args(["--token-info", "--rate-limit"])
                .run()?,
            1
        ),
        @"error: the argument '--token-info' cannot be used with '--rate-limit'"
    );

    insta::assert_snapshot!(
        first_lines(
            &validator()
                .expects_failure(true)
                .args(["--validate", "--token-info"])
                .run()?,
            1
        ),
        @"error: the argument '--validate' cannot be used with '--token-info'"
    );

    Ok(())
}

#[test]
fn test_missing_api_key() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        first_lines(
            &validator().api_key(None).expects_failure(true).run()?,
            2
        ),
        @r"
    error: the following required arguments were not provided:
      --api-key <API_KEY>
    "
    );

    Ok(())
}

/// The key can come from the environment instead of the command line.
#[test]
fn test_api_key_from_env() -> anyhow::Result<()> {
    let output = validator()
        .api_key(None)
        .setenv("GITHUB_API_KEY", "   ")
        .expects_failure(true)
        .run()?;

    assert!(output.contains("GitHub token cannot be empty"), "{output}");

    Ok(())
}

#[test]
fn test_blank_api_key() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        first_lines(
            &validator()
                .api_key(Some("  "))
                .expects_failure(true)
                .run()?,
            1
        ),
        @"error: invalid value '  ' for '--api-key <API_KEY>': GitHub token cannot be empty"
    );

    Ok(())
}

#[test]
fn test_gh_hostname_rejects_urls() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        first_lines(
            &validator()
                .expects_failure(true)
                .args(["--gh-hostname", "https://ghe.example.com"])
                .run()?,
            1
        ),
        @"error: invalid value 'https://ghe.example.com' for '--gh-hostname <GH_HOSTNAME>': must be a domain name, not a URL (use --base-url for URLs)"
    );

    Ok(())
}

/// The creation check only makes sense while validating.
#[test]
fn test_creation_test_needs_validate_mode() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        first_lines(
            &validator()
                .expects_failure(true)
                .args(["--creation-test", "--rate-limit"])
                .run()?,
            1
        ),
        @"error: the argument '--creation-test' cannot be used with '--rate-limit'"
    );

    Ok(())
}

#[test]
fn test_missing_config_file() -> anyhow::Result<()> {
    let output = validator()
        .expects_failure(true)
        .config("does/not/exist.yml")
        .run()?;

    assert!(output.contains("fatal: no validation was performed"), "{output}");
    assert!(output.contains("failed to load config"), "{output}");

    Ok(())
}
