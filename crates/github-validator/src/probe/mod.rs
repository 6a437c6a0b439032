//! Scope probes: read-only checks that infer which OAuth scopes a token holds.
//!
//! Each probe observes the outcome of one or more read calls and reports
//! whether the scope appears to be granted. Probes never mutate anything,
//! so scopes that can only be proven by writing are inferred from a weaker
//! read signal and tagged [`Confidence::Proxy`]. The only write is the
//! opt-in repository [`creation`] check.

use github_rest_models::{orgs::Organization, rate_limit::RateLimitResource, repos::Repository, users::User};
use indexmap::IndexMap;
use indicatif::ProgressStyle;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{Instrument as _, Span, info_span, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt as _;

use crate::{
    cache::Params,
    config::Config,
    errors::render_chain,
    github::{Client, ClientError},
};

mod actions;
mod codespaces;
pub(crate) mod creation;
mod enterprise;
mod org;
mod repo;
mod security;
mod user;

use creation::CreationTest;

/// How directly a probe's verdict reflects the scope it names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Confidence {
    /// The probe exercises what the scope grants.
    Exact,
    /// The probe infers the scope from a weaker, read-only signal.
    Proxy,
}

macro_rules! scopes {
    ($(
        $tier:ident {
            $($variant:ident => $ident:literal, $confidence:ident, $forbidden:expr;)*
        }
    )*) => {
        /// A named scope the prober knows how to check.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub(crate) enum Scope {
            $($($variant,)*)*
        }

        impl Scope {
            $(pub(crate) const $tier: &'static [Scope] = &[$(Scope::$variant,)*];)*

            pub(crate) fn from_ident(ident: &str) -> Option<Self> {
                match ident {
                    $($($ident => Some(Self::$variant),)*)*
                    _ => None,
                }
            }

            pub(crate) fn ident(self) -> &'static str {
                match self {
                    $($(Self::$variant => $ident,)*)*
                }
            }

            pub(crate) fn confidence(self) -> Confidence {
                match self {
                    $($(Self::$variant => Confidence::$confidence,)*)*
                }
            }

            /// The verdict recorded when the probe's own lookups are
            /// refused with a 403. `None` means a 403 is reported as an error.
            fn forbidden_message(self) -> Option<&'static str> {
                match self {
                    $($(Self::$variant => $forbidden,)*)*
                }
            }
        }
    };
}

scopes! {
    CRITICAL {
        Repo => "repo", Exact, Some("Repository access denied");
        RepoWrite => "repo_write", Proxy, None;
        RepoDelete => "repo_delete", Proxy, None;
        AdminOrg => "admin:org", Proxy, Some("Organization admin access denied");
        ReadOrg => "read:org", Exact, Some("Organization read access denied");
        WriteOrg => "write:org", Exact, Some("Organization write access denied");
        AdminRepoHook => "admin:repo_hook", Proxy, Some("Repository webhook access denied");
        WriteRepoHook => "write:repo_hook", Proxy, Some("Cannot write repository webhooks");
        ReadRepoHook => "read:repo_hook", Exact, Some("Repository webhook read access denied");
        AdminOrgHook => "admin:org_hook", Exact, Some("Organization webhook access denied");
        ReadOrgHook => "read:org_hook", Exact, Some("Organization webhook read access denied");
        Workflow => "workflow", Exact, None;
        RepoSecrets => "repo_secrets", Exact, Some("Repository secrets access denied");
        OrgSecrets => "org_secrets", Exact, Some("Organization secrets access denied");
        WritePackages => "write:packages", Proxy, Some("Package access denied");
        DeletePackages => "delete:packages", Proxy, Some("Package access denied");
        AdminGpgKey => "admin:gpg_key", Proxy, Some("GPG keys access denied");
        WriteGpgKey => "write:gpg_key", Proxy, Some("GPG keys access denied");
        AdminPublicKey => "admin:public_key", Proxy, Some("SSH keys access denied");
        WritePublicKey => "write:public_key", Proxy, Some("SSH keys access denied");
        AdminEnterprise => "admin:enterprise", Exact, Some("Enterprise admin access denied");
        ManageBillingEnterprise => "manage_billing:enterprise", Exact, Some("Enterprise billing access denied");
        EnterpriseAdmin => "enterprise_admin", Exact, Some("Enterprise admin access denied");
        ManageRunnersEnterprise => "manage_runners:enterprise", Exact, Some("Enterprise runners management denied");
        ReadRunnersEnterprise => "read:runners:enterprise", Proxy, Some("Enterprise runners management denied");
        ReadAuditLog => "read:audit_log", Exact, Some("Audit log read access denied");
        WriteAuditLog => "write:audit_log", Proxy, Some("Audit log read access denied");
    }
    STANDARD {
        ReadUser => "read:user", Exact, None;
        User => "user", Exact, None;
        Gist => "gist", Exact, Some("Gist access denied");
        ReadPackages => "read:packages", Exact, Some("Package access denied");
        Notifications => "notifications", Exact, Some("Notifications access denied");
        UserEmail => "user:email", Exact, Some("User email access denied");
        UserFollow => "user:follow", Exact, Some("Follow access denied");
        ReadDiscussion => "read:discussion", Exact, Some("Discussions access denied");
        WriteDiscussion => "write:discussion", Proxy, Some("Discussions access denied");
        ReadGpgKey => "read:gpg_key", Exact, Some("GPG keys access denied");
        ReadPublicKey => "read:public_key", Exact, Some("SSH keys access denied");
        ReadEnterprise => "read:enterprise", Exact, Some("Enterprise read access denied");
        RepoStatus => "repo:status", Exact, Some("Commit status access denied");
        RepoDeployment => "repo_deployment", Exact, Some("Deployment access denied");
        PublicRepo => "public_repo", Exact, Some("Public repository access denied");
        RepoInvite => "repo:invite", Exact, Some("Repository invitation access denied");
        Issues => "issues", Exact, Some("Issues access denied");
        TeamManagement => "team_management", Exact, Some("Team access denied");
        BranchProtection => "branch_protection", Exact, Some("Branch protection access denied");
        CodeScanning => "code_scanning", Exact, Some("Code scanning access denied");
        DependabotAlerts => "dependabot_alerts", Exact, Some("Dependabot alerts access denied");
        SecurityAdvisories => "security_advisories", Exact, Some("Security advisories access denied");
        SecretScanningAlerts => "secret_scanning_alerts", Exact, Some("Secret scanning access denied");
        SecurityEvents => "security_events", Exact, None;
        Projects => "projects", Exact, Some("Projects access denied");
        RunnersRepo => "runners_repo", Exact, Some("Repository runners access denied");
        RunnersOrg => "runners_org", Exact, Some("Organization runners access denied");
        RepoAccessCount => "repo_access_count", Exact, Some("Repository access denied");
        SecretsComprehensive => "secrets_comprehensive", Exact, Some("Secrets access denied");
        Codespace => "codespace", Exact, Some("Codespaces access denied");
        CodespacesMetadata => "codespaces_metadata", Exact, Some("Codespaces metadata access denied");
        CodespacesUser => "codespaces_user", Exact, Some("Codespaces user access denied");
        CodespacesLifecycleAdmin => "codespaces_lifecycle_admin", Exact, Some("Codespaces lifecycle access denied");
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ident())
    }
}

/// What a probe concluded, before it's attached to a scope.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ProbeOutcome {
    pub(crate) granted: bool,
    pub(crate) message: String,
    pub(crate) details: IndexMap<&'static str, Value>,
}

impl ProbeOutcome {
    fn granted(message: impl Into<String>) -> Self {
        Self {
            granted: true,
            message: message.into(),
            details: IndexMap::new(),
        }
    }

    fn denied(message: impl Into<String>) -> Self {
        Self {
            granted: false,
            message: message.into(),
            details: IndexMap::new(),
        }
    }

    fn detail(mut self, key: &'static str, value: impl Serialize) -> Self {
        self.details
            .insert(key, serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

type ProbeResult = Result<ProbeOutcome, ClientError>;

/// The verdict for a single scope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct PermissionResult {
    pub(crate) permission: &'static str,
    pub(crate) granted: bool,
    pub(crate) message: String,
    pub(crate) details: IndexMap<&'static str, Value>,
    pub(crate) confidence: Confidence,
    /// The probe failed for a reason other than a permission refusal.
    pub(crate) errored: bool,
}

impl PermissionResult {
    fn new(scope: Scope, result: ProbeResult) -> Self {
        let (outcome, errored) = match result {
            Ok(outcome) => (outcome, false),
            Err(err) => match scope.forbidden_message() {
                Some(message) if err.is_forbidden() => (ProbeOutcome::denied(message), false),
                _ => (
                    ProbeOutcome::denied(format!("Error: {}", render_chain(&err))),
                    true,
                ),
            },
        };

        Self {
            permission: scope.ident(),
            granted: outcome.granted,
            message: outcome.message,
            details: outcome.details,
            confidence: scope.confidence(),
            errored,
        }
    }

    /// Whether this result counts towards the run's error tally.
    pub(crate) fn is_error(&self) -> bool {
        self.errored || self.message.contains("Error")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub(crate) struct ValidationSummary {
    pub(crate) total_tested: usize,
    pub(crate) granted: usize,
    pub(crate) denied: usize,
    pub(crate) errors: usize,
}

impl ValidationSummary {
    fn tally<'r>(results: impl IntoIterator<Item = &'r PermissionResult>) -> Self {
        results
            .into_iter()
            .fold(Self::default(), |mut summary, result| {
                summary.total_tested += 1;
                if result.granted {
                    summary.granted += 1;
                } else {
                    summary.denied += 1;
                }
                if result.is_error() {
                    summary.errors += 1;
                }
                summary
            })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct AuthenticatedUser {
    pub(crate) login: String,
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) name: Option<String>,
    pub(crate) email: Option<String>,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            login: user.login,
            kind: user.kind,
            name: user.name,
            email: user.email,
        }
    }
}

/// The outcome of a full validation run.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ValidationReport {
    pub(crate) critical_permissions: IndexMap<&'static str, PermissionResult>,
    pub(crate) standard_permissions: IndexMap<&'static str, PermissionResult>,
    pub(crate) summary: ValidationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) authenticated_user: Option<AuthenticatedUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) rate_limit: Option<RateLimitResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) creation_test: Option<CreationTest>,
}

/// Per-item lookups inside a probe are best-effort: a failure only
/// means that item doesn't count.
fn best_effort<T>(result: Result<Option<T>, ClientError>) -> Option<T> {
    result.unwrap_or_else(|err| {
        tracing::debug!("ignoring failed lookup: {err}");
        None
    })
}

/// Whether a JSON value carries anything: not null, `false`, zero, or an
/// empty string, array or object.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Runs scope probes against a single token.
pub(crate) struct Prober<'a> {
    client: &'a Client,
    config: &'a Config,
    org: Option<&'a str>,
    enterprise: Option<&'a str>,
    run_creation_test: bool,
    repos: OnceCell<Vec<Repository>>,
    orgs: OnceCell<Vec<Organization>>,
}

impl<'a> Prober<'a> {
    pub(crate) fn new(
        client: &'a Client,
        config: &'a Config,
        org: Option<&'a str>,
        enterprise: Option<&'a str>,
    ) -> Self {
        Self {
            client,
            config,
            org,
            enterprise,
            run_creation_test: false,
            repos: OnceCell::new(),
            orgs: OnceCell::new(),
        }
    }

    /// Also run the repository creation check at the end of [`Self::validate_all`].
    pub(crate) fn with_creation_test(mut self, enabled: bool) -> Self {
        self.run_creation_test = enabled;
        self
    }

    /// Every repository visible to the token, fetched once per run.
    async fn repos(&self) -> Result<&[Repository], ClientError> {
        self.repos
            .get_or_try_init(|| async {
                Ok::<_, ClientError>(
                    self.client
                        .list::<Repository>("/user/repos", None, None)
                        .await?
                        .unwrap_or_default(),
                )
            })
            .await
            .map(Vec::as_slice)
    }

    /// Every organization the token's user belongs to, fetched once per run.
    async fn orgs(&self) -> Result<&[Organization], ClientError> {
        self.orgs
            .get_or_try_init(|| async {
                Ok::<_, ClientError>(
                    self.client
                        .list::<Organization>("/user/orgs", None, None)
                        .await?
                        .unwrap_or_default(),
                )
            })
            .await
            .map(Vec::as_slice)
    }

    /// The first `repo-sample * factor` repositories.
    fn sample_repos<'r>(&self, repos: &'r [Repository], factor: usize) -> &'r [Repository] {
        &repos[..repos.len().min(self.config.probes.repo_sample * factor)]
    }

    fn sample_orgs<'r>(&self, orgs: &'r [Organization]) -> &'r [Organization] {
        &orgs[..orgs.len().min(self.config.probes.org_sample)]
    }

    /// A full listing, or `None` if it doesn't exist for this token.
    async fn listing(
        &self,
        endpoint: &str,
        field: Option<&str>,
    ) -> Result<Option<Vec<Value>>, ClientError> {
        self.client
            .paginate(endpoint, &Params::new(), field, None)
            .await
    }

    async fn probe(&self, scope: Scope) -> ProbeResult {
        match scope {
            Scope::Repo => self.repo_access().await,
            Scope::RepoWrite => self.repo_write().await,
            Scope::RepoDelete => self.repo_delete().await,
            Scope::AdminOrg => self.org_admin().await,
            Scope::ReadOrg => self.org_read().await,
            Scope::WriteOrg => self.org_write().await,
            Scope::AdminRepoHook => self.repo_hooks_admin().await,
            Scope::WriteRepoHook => self.repo_hooks_write().await,
            Scope::ReadRepoHook => self.repo_hooks_read().await,
            Scope::AdminOrgHook => self.org_hooks_admin().await,
            Scope::ReadOrgHook => self.org_hooks_read().await,
            Scope::Workflow => self.workflows().await,
            Scope::RepoSecrets => self.repo_secrets().await,
            Scope::OrgSecrets => self.org_secrets().await,
            Scope::WritePackages => self.packages_write().await,
            Scope::DeletePackages => self.packages_delete().await,
            Scope::AdminGpgKey => self.gpg_keys_admin().await,
            Scope::WriteGpgKey => self.gpg_keys_write().await,
            Scope::AdminPublicKey => self.ssh_keys_admin().await,
            Scope::WritePublicKey => self.ssh_keys_write().await,
            Scope::AdminEnterprise => self.admin_enterprise().await,
            Scope::ManageBillingEnterprise => self.manage_billing_enterprise().await,
            Scope::EnterpriseAdmin => self.enterprise_admin().await,
            Scope::ManageRunnersEnterprise => self.manage_runners_enterprise().await,
            Scope::ReadRunnersEnterprise => self.read_runners_enterprise().await,
            Scope::ReadAuditLog => self.read_audit_log().await,
            Scope::WriteAuditLog => self.write_audit_log().await,
            Scope::ReadUser => self.user_info().await,
            Scope::User => self.user_full_profile().await,
            Scope::Gist => self.gists().await,
            Scope::ReadPackages => self.packages_read().await,
            Scope::Notifications => self.notifications().await,
            Scope::UserEmail => self.user_emails().await,
            Scope::UserFollow => self.user_follow().await,
            Scope::ReadDiscussion => self.discussions_read().await,
            Scope::WriteDiscussion => self.discussions_write().await,
            Scope::ReadGpgKey => self.gpg_keys_read().await,
            Scope::ReadPublicKey => self.ssh_keys_read().await,
            Scope::ReadEnterprise => self.read_enterprise().await,
            Scope::RepoStatus => self.repo_status().await,
            Scope::RepoDeployment => self.repo_deployment().await,
            Scope::PublicRepo => self.public_repo().await,
            Scope::RepoInvite => self.repo_invite().await,
            Scope::Issues => self.issues().await,
            Scope::TeamManagement => self.team_management().await,
            Scope::BranchProtection => self.branch_protection().await,
            Scope::CodeScanning => self.code_scanning().await,
            Scope::DependabotAlerts => self.dependabot_alerts().await,
            Scope::SecurityAdvisories => self.security_advisories().await,
            Scope::SecretScanningAlerts => self.secret_scanning_alerts().await,
            Scope::SecurityEvents => self.security_events().await,
            Scope::Projects => self.projects().await,
            Scope::RunnersRepo => self.runners_repo().await,
            Scope::RunnersOrg => self.runners_org().await,
            Scope::RepoAccessCount => self.repo_access_count().await,
            Scope::SecretsComprehensive => self.secrets_comprehensive().await,
            Scope::Codespace => self.codespaces().await,
            Scope::CodespacesMetadata => self.codespaces_metadata().await,
            Scope::CodespacesUser => self.codespaces_user().await,
            Scope::CodespacesLifecycleAdmin => self.codespaces_lifecycle_admin().await,
        }
    }

    /// Probes a single scope. Never fails: errors become denied results.
    #[instrument(skip(self))]
    pub(crate) async fn run(&self, scope: Scope) -> PermissionResult {
        let result = PermissionResult::new(scope, self.probe(scope).await);
        tracing::debug!(
            "{scope}: granted={granted} ({message})",
            granted = result.granted,
            message = result.message
        );
        result
    }

    async fn run_tier(&self, scopes: &[Scope]) -> IndexMap<&'static str, PermissionResult> {
        let mut results = IndexMap::new();

        for &scope in scopes {
            Span::current().pb_set_message(scope.ident());
            results.insert(scope.ident(), self.run(scope).await);
            Span::current().pb_inc(1);
        }

        results
    }

    /// Runs every enabled probe, critical scopes first.
    pub(crate) async fn validate_all(&self) -> ValidationReport {
        let enabled = |tier: &[Scope]| {
            tier.iter()
                .copied()
                .filter(|scope| {
                    let disabled = self.config.disables(scope.ident());
                    if disabled {
                        tracing::debug!("skipping {scope}: disabled by config");
                    }
                    !disabled
                })
                .collect::<Vec<_>>()
        };
        let critical = enabled(Scope::CRITICAL);
        let standard = enabled(Scope::STANDARD);

        let span = info_span!("validate");
        span.pb_set_length((critical.len() + standard.len()) as u64);
        if let Ok(style) =
            ProgressStyle::with_template("[{elapsed_precise}] {bar:!30.cyan/blue} {msg}")
        {
            span.pb_set_style(&style);
        }

        let (critical_permissions, standard_permissions) = async {
            (
                self.run_tier(&critical).await,
                self.run_tier(&standard).await,
            )
        }
        .instrument(span)
        .await;

        let summary = ValidationSummary::tally(
            critical_permissions
                .values()
                .chain(standard_permissions.values()),
        );

        let authenticated_user = match self.client.test_authentication().await {
            Ok(user) => user.map(AuthenticatedUser::from),
            Err(err) => {
                tracing::debug!("couldn't attach the authenticated user: {err}");
                None
            }
        };
        let rate_limit = match self.client.rate_limit_info().await {
            Ok(overview) => overview.map(|overview| overview.rate),
            Err(err) => {
                tracing::debug!("couldn't attach the rate limit: {err}");
                None
            }
        };

        let creation_test = if self.run_creation_test {
            Some(self.creation_test().await)
        } else {
            None
        };

        ValidationReport {
            critical_permissions,
            standard_permissions,
            summary,
            authenticated_user,
            rate_limit,
            creation_test,
        }
    }
}
