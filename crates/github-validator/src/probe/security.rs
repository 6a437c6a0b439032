//! Security-feature probes: alerts, advisories and Actions secrets.

use github_rest_models::actions::Secret;
use serde::Serialize;

use super::{PermissionResult, ProbeOutcome, ProbeResult, Prober, Scope, best_effort};
use crate::github::ClientError;

#[derive(Serialize)]
struct RepoSecrets<'a> {
    repo: &'a str,
    secret_count: usize,
    secrets: Vec<Secret>,
}

#[derive(Serialize)]
struct OrgSecrets<'a> {
    org: &'a str,
    secret_count: usize,
    secrets: Vec<Secret>,
}

impl Prober<'_> {
    /// Probes a per-repository alert or advisory listing, reporting the
    /// first sampled repository that exposes it.
    async fn repo_alerts(
        &self,
        suffix: &str,
        count_key: &'static str,
        granted: &str,
        denied: &str,
    ) -> ProbeResult {
        Ok(match self.first_repo_listing(suffix, None).await? {
            Some((repo, items)) => ProbeOutcome::granted(granted)
                .detail("repo", repo)
                .detail(count_key, items.len()),
            None => ProbeOutcome::denied(denied),
        })
    }

    pub(super) async fn code_scanning(&self) -> ProbeResult {
        self.repo_alerts(
            "code-scanning/alerts",
            "alert_count",
            "Can access code scanning alerts",
            "Cannot access code scanning",
        )
        .await
    }

    pub(super) async fn dependabot_alerts(&self) -> ProbeResult {
        self.repo_alerts(
            "dependabot/alerts",
            "alert_count",
            "Can access Dependabot alerts",
            "Cannot access Dependabot alerts",
        )
        .await
    }

    pub(super) async fn security_advisories(&self) -> ProbeResult {
        self.repo_alerts(
            "security-advisories",
            "advisory_count",
            "Can access security advisories",
            "Cannot access security advisories",
        )
        .await
    }

    pub(super) async fn secret_scanning_alerts(&self) -> ProbeResult {
        self.repo_alerts(
            "secret-scanning/alerts",
            "alert_count",
            "Can access secret scanning alerts",
            "Cannot access secret scanning alerts",
        )
        .await
    }

    /// Folds the three alert probes into one verdict, keeping each
    /// sub-result in the details.
    pub(super) async fn security_events(&self) -> ProbeResult {
        let code_scanning = PermissionResult::new(Scope::CodeScanning, self.code_scanning().await);
        let dependabot =
            PermissionResult::new(Scope::DependabotAlerts, self.dependabot_alerts().await);
        let secret_scanning = PermissionResult::new(
            Scope::SecretScanningAlerts,
            self.secret_scanning_alerts().await,
        );

        let outcome = if [&code_scanning, &dependabot, &secret_scanning]
            .iter()
            .any(|result| result.granted)
        {
            ProbeOutcome::granted("Can access security events data")
        } else {
            ProbeOutcome::denied("Security events access not detected")
        };

        Ok(outcome
            .detail("code_scanning", code_scanning)
            .detail("dependabot", dependabot)
            .detail("secret_scanning", secret_scanning))
    }

    pub(super) async fn repo_secrets(&self) -> ProbeResult {
        Ok(
            match self
                .first_repo_listing("actions/secrets", Some("secrets"))
                .await?
            {
                Some((repo, secrets)) => ProbeOutcome::granted("Can access repository secrets")
                    .detail("repo", repo)
                    .detail("secret_count", secrets.len()),
                None => ProbeOutcome::denied("Cannot access repository secrets"),
            },
        )
    }

    pub(super) async fn org_secrets(&self) -> ProbeResult {
        Ok(
            match self
                .first_org_listing("actions/secrets", Some("secrets"))
                .await?
            {
                Some((org, secrets)) => {
                    ProbeOutcome::granted(format!("Can access organization secrets: {org}"))
                        .detail("org", org)
                        .detail("secret_count", secrets.len())
                }
                None => ProbeOutcome::denied("Cannot access organization secrets"),
            },
        )
    }

    async fn secrets(&self, endpoint: &str) -> Result<Option<Vec<Secret>>, ClientError> {
        self.client.list::<Secret>(endpoint, Some("secrets"), None).await
    }

    /// Inventories secret names (never values) across a wider repository
    /// sample and every sampled organization.
    pub(super) async fn secrets_comprehensive(&self) -> ProbeResult {
        let mut repo_secrets = vec![];
        for repo in self.sample_repos(self.repos().await?, 4) {
            if let Some(secrets) = best_effort(
                self.secrets(&format!("/repos/{}/actions/secrets", repo.full_name))
                    .await,
            ) && !secrets.is_empty()
            {
                repo_secrets.push(RepoSecrets {
                    repo: &repo.full_name,
                    secret_count: secrets.len(),
                    secrets,
                });
            }
        }

        let sampled = self
            .sample_orgs(self.orgs().await?)
            .iter()
            .map(|org| org.login.as_str())
            .filter(|&login| Some(login) != self.org);

        let mut org_secrets = vec![];
        for org in self.org.into_iter().chain(sampled) {
            if let Some(secrets) =
                best_effort(self.secrets(&format!("/orgs/{org}/actions/secrets")).await)
                && !secrets.is_empty()
            {
                org_secrets.push(OrgSecrets {
                    org,
                    secret_count: secrets.len(),
                    secrets,
                });
            }
        }

        let total_repo_secrets: usize = repo_secrets.iter().map(|r| r.secret_count).sum();
        let total_org_secrets: usize = org_secrets.iter().map(|o| o.secret_count).sum();
        let total = total_repo_secrets + total_org_secrets;

        if total == 0 {
            return Ok(ProbeOutcome::denied(
                "Cannot access secrets or no secrets found",
            ));
        }

        Ok(ProbeOutcome::granted(format!(
            "Can access {total} secrets ({total_repo_secrets} repo, {total_org_secrets} org)"
        ))
        .detail("repos_with_secrets", repo_secrets.len())
        .detail("orgs_with_secrets", org_secrets.len())
        .detail("total_repo_secrets", total_repo_secrets)
        .detail("total_org_secrets", total_org_secrets)
        .detail("repo_secrets", repo_secrets)
        .detail("org_secrets", org_secrets))
    }
}
