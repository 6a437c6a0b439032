//! Token metadata: granted scopes, token kind, and App installations.

use github_rest_models::{
    apps::{Installation, InstallationList},
    rate_limit::RateLimitResource,
    users::User,
};
use serde::Serialize;
use tracing::instrument;

use crate::{
    errors::render_chain,
    github::{Client, GitHubToken},
    utils::split_header_list,
};

/// What kind of credential the token appears to be, judged by what the
/// API reports about it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TokenType {
    GithubAppToken,
    PersonalAccessToken,
    GithubActionsToken,
    OauthToken,
    #[default]
    Unknown,
}

impl TokenType {
    /// Infers the token type from its OAuth scopes alone.
    fn from_scopes(scopes: &[String]) -> Self {
        let has = |scope: &str| scopes.iter().any(|s| s == scope);

        if scopes.is_empty() {
            Self::Unknown
        } else if has("repo") || has("admin:org") {
            Self::PersonalAccessToken
        } else if has("workflow") {
            Self::GithubActionsToken
        } else {
            Self::OauthToken
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::GithubAppToken => "github_app_token",
            Self::PersonalAccessToken => "personal_access_token",
            Self::GithubActionsToken => "github_actions_token",
            Self::OauthToken => "oauth_token",
            Self::Unknown => "unknown",
        }
    }
}

/// The kind of token, as told by GitHub's token prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TokenPrefixKind {
    ClassicPersonalAccessToken,
    FineGrainedPersonalAccessToken,
    OauthAccessToken,
    InstallationAccessToken,
    UserToServerToken,
}

impl TokenPrefixKind {
    fn detect(token: &str) -> Option<Self> {
        // `github_pat_` must come before anything that could shadow it.
        [
            ("github_pat_", Self::FineGrainedPersonalAccessToken),
            ("ghp_", Self::ClassicPersonalAccessToken),
            ("gho_", Self::OauthAccessToken),
            ("ghs_", Self::InstallationAccessToken),
            ("ghu_", Self::UserToServerToken),
        ]
        .into_iter()
        .find_map(|(prefix, kind)| token.starts_with(prefix).then_some(kind))
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::ClassicPersonalAccessToken => "classic_personal_access_token",
            Self::FineGrainedPersonalAccessToken => "fine_grained_personal_access_token",
            Self::OauthAccessToken => "oauth_access_token",
            Self::InstallationAccessToken => "installation_access_token",
            Self::UserToServerToken => "user_to_server_token",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub(crate) struct TokenMetadata {
    pub(crate) scopes: Vec<String>,
    pub(crate) accepted_scopes: Vec<String>,
    pub(crate) user: Option<User>,
    pub(crate) token_type: TokenType,
    pub(crate) token_prefix_kind: Option<TokenPrefixKind>,
    pub(crate) installations: Vec<Installation>,
    pub(crate) rate_limit: Option<RateLimitResource>,
    /// Lookups that failed along the way. None of them are fatal.
    pub(crate) errors: Vec<String>,
}

impl TokenMetadata {
    /// Collects everything the API will say about `token`.
    #[instrument(skip_all)]
    pub(crate) async fn collect(client: &Client, token: &GitHubToken) -> Self {
        let mut metadata = Self {
            token_prefix_kind: TokenPrefixKind::detect(token.as_str()),
            ..Default::default()
        };

        match client.get_raw("/user").await {
            Ok(Some(raw)) => {
                let header = |name: &str| {
                    raw.headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(split_header_list)
                        .unwrap_or_default()
                };
                metadata.scopes = header("x-oauth-scopes");
                metadata.accepted_scopes = header("x-accepted-oauth-scopes");

                match serde_json::from_value::<User>(raw.body) {
                    Ok(user) => metadata.user = Some(user),
                    Err(err) => metadata
                        .errors
                        .push(format!("Failed to decode user info: {err}")),
                }
            }
            Ok(None) => metadata.errors.push("Failed to get user info: not found".into()),
            Err(err) => metadata
                .errors
                .push(format!("Failed to get user info: {}", render_chain(&err))),
        }

        match client.rate_limit_info().await {
            Ok(overview) => metadata.rate_limit = overview.map(|overview| overview.rate),
            Err(err) => metadata
                .errors
                .push(format!("Failed to get rate limit: {}", render_chain(&err))),
        }

        metadata.token_type = TokenType::from_scopes(&metadata.scopes);

        // Only tokens acting on behalf of a GitHub App can list installations;
        // everything else gets a 403 here, which says nothing new.
        match client
            .get_as::<InstallationList>("/user/installations")
            .await
        {
            Ok(Some(list)) if !list.installations.is_empty() => {
                metadata.token_type = TokenType::GithubAppToken;
                metadata.installations = list.installations;
            }
            Ok(_) => {}
            Err(err) if err.is_forbidden() || err.is_unauthorized() => {
                tracing::debug!("installations unavailable: {err}");
            }
            Err(err) => metadata
                .errors
                .push(format!("Failed to list installations: {}", render_chain(&err))),
        }

        metadata
    }
}
