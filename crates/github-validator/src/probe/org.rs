//! Organization-level probes: membership, teams, webhooks, discussions,
//! projects and the audit log.

use github_rest_models::orgs::Team;
use serde_json::Value;

use super::{ProbeOutcome, ProbeResult, Prober, best_effort, truthy};
use crate::github::ClientError;

impl Prober<'_> {
    /// Lists `/orgs/{org}/{suffix}` for the target organization, then for
    /// each sampled organization, and returns the first listing that exists.
    ///
    /// A refusal for the target organization is the probe's verdict; refusals
    /// for sampled organizations are skipped.
    pub(super) async fn first_org_listing(
        &self,
        suffix: &str,
        field: Option<&str>,
    ) -> Result<Option<(&str, Vec<Value>)>, ClientError> {
        if let Some(org) = self.org
            && let Some(items) = self.listing(&format!("/orgs/{org}/{suffix}"), field).await?
        {
            return Ok(Some((org, items)));
        }

        for org in self.sample_orgs(self.orgs().await?) {
            if let Some(items) = best_effort(
                self.listing(&format!("/orgs/{}/{suffix}", org.login), field)
                    .await,
            ) {
                return Ok(Some((org.login.as_str(), items)));
            }
        }

        Ok(None)
    }

    pub(super) async fn org_admin(&self) -> ProbeResult {
        let Some(org) = self.org else {
            return Ok(ProbeOutcome::denied("No organization admin access detected"));
        };

        // Org webhooks are admin-only; members are the fallback signal.
        if best_effort(self.client.get(&format!("/orgs/{org}/hooks")).await).is_some() {
            return Ok(
                ProbeOutcome::granted(format!("Has admin access to organization: {org}"))
                    .detail("org", org),
            );
        }

        if let Some(members) =
            best_effort(self.listing(&format!("/orgs/{org}/members"), None).await)
        {
            return Ok(
                ProbeOutcome::granted("Can access org members (admin access likely)")
                    .detail("org", org)
                    .detail("member_count", members.len()),
            );
        }

        Ok(ProbeOutcome::denied("No organization admin access detected"))
    }

    pub(super) async fn org_read(&self) -> ProbeResult {
        if let Some(org) = self.org
            && self
                .client
                .get(&format!("/orgs/{org}"))
                .await?
                .as_ref()
                .is_some_and(truthy)
        {
            return Ok(ProbeOutcome::granted(format!("Can read organization: {org}")).detail("org", org));
        }

        let orgs = self.orgs().await?;
        if orgs.is_empty() {
            return Ok(ProbeOutcome::denied("Cannot read organizations"));
        }

        Ok(
            ProbeOutcome::granted(format!("Can read {} organizations", orgs.len()))
                .detail("org_count", orgs.len())
                .detail(
                    "orgs",
                    orgs.iter().map(|org| org.login.as_str()).collect::<Vec<_>>(),
                ),
        )
    }

    async fn teams(&self, org: &str) -> Result<Option<Vec<Team>>, ClientError> {
        self.client
            .list::<Team>(&format!("/orgs/{org}/teams"), None, None)
            .await
    }

    pub(super) async fn org_write(&self) -> ProbeResult {
        if let Some(org) = self.org
            && let Some(teams) = self.teams(org).await?
            && let Some(team) = teams.first()
            && best_effort(
                self.listing(&format!("/teams/{}/members", team.id), None)
                    .await,
            )
            .is_some()
        {
            return Ok(ProbeOutcome::granted(format!(
                "Can manage teams and members in organization: {org}"
            ))
            .detail("org", org)
            .detail("team_count", teams.len()));
        }

        for org in self.sample_orgs(self.orgs().await?) {
            if let Some(teams) = best_effort(self.teams(&org.login).await)
                && !teams.is_empty()
            {
                return Ok(
                    ProbeOutcome::granted(format!("Can manage teams in organization: {}", org.login))
                        .detail("org", &org.login)
                        .detail("team_count", teams.len()),
                );
            }
        }

        Ok(ProbeOutcome::denied("Cannot manage organization teams"))
    }

    pub(super) async fn team_management(&self) -> ProbeResult {
        if let Some(org) = self.org
            && let Some(teams) = self.teams(org).await?
            && let Some(team) = teams.first()
            && best_effort(self.client.get(&format!("/teams/{}", team.id)).await).is_some()
        {
            return Ok(
                ProbeOutcome::granted(format!("Can access teams in organization: {org}"))
                    .detail("org", org)
                    .detail("team_count", teams.len()),
            );
        }

        for org in self.sample_orgs(self.orgs().await?) {
            if let Some(teams) = best_effort(self.teams(&org.login).await)
                && !teams.is_empty()
            {
                return Ok(
                    ProbeOutcome::granted(format!("Can access teams in organization: {}", org.login))
                        .detail("org", &org.login)
                        .detail("team_count", teams.len()),
                );
            }
        }

        Ok(ProbeOutcome::denied("Cannot access teams"))
    }

    pub(super) async fn org_hooks_admin(&self) -> ProbeResult {
        Ok(match self.first_org_listing("hooks", None).await? {
            Some((org, hooks)) => {
                ProbeOutcome::granted(format!("Can manage organization webhooks: {org}"))
                    .detail("org", org)
                    .detail("hook_count", hooks.len())
            }
            None => ProbeOutcome::denied("Cannot manage organization webhooks"),
        })
    }

    pub(super) async fn org_hooks_read(&self) -> ProbeResult {
        Ok(match self.first_org_listing("hooks", None).await? {
            Some((org, hooks)) => {
                ProbeOutcome::granted(format!("Can read organization webhooks: {org}"))
                    .detail("org", org)
                    .detail("hook_count", hooks.len())
            }
            None => ProbeOutcome::denied("Cannot read organization webhooks"),
        })
    }

    pub(super) async fn discussions_read(&self) -> ProbeResult {
        Ok(match self.first_org_listing("discussions", None).await? {
            Some((org, discussions)) => {
                ProbeOutcome::granted(format!("Can read discussions in organization: {org}"))
                    .detail("org", org)
                    .detail("discussion_count", discussions.len())
            }
            None => ProbeOutcome::denied("Cannot access discussions"),
        })
    }

    /// Writing a discussion would create content; readability stands in.
    pub(super) async fn discussions_write(&self) -> ProbeResult {
        self.discussions_read().await
    }

    pub(super) async fn projects(&self) -> ProbeResult {
        if let Some(org) = self.org
            && let Some(projects) =
                best_effort(self.listing(&format!("/orgs/{org}/projects"), None).await)
        {
            return Ok(
                ProbeOutcome::granted(format!("Can access projects in organization: {org}"))
                    .detail("org", org)
                    .detail("project_count", projects.len()),
            );
        }

        if let Some(projects) = best_effort(self.listing("/user/projects", None).await) {
            return Ok(
                ProbeOutcome::granted(format!("Can access {} user projects", projects.len()))
                    .detail("project_count", projects.len()),
            );
        }

        Ok(ProbeOutcome::denied("Cannot access projects"))
    }

    pub(super) async fn read_audit_log(&self) -> ProbeResult {
        let Some(org) = self.org else {
            return Ok(ProbeOutcome::denied(
                "Organization name required for audit log access",
            ));
        };

        Ok(match self.client.get(&format!("/orgs/{org}/audit-log")).await? {
            Some(events) => ProbeOutcome::granted(format!("Can read audit log for {org}"))
                .detail("event_count", events.as_array().map_or(0, Vec::len)),
            None => ProbeOutcome::denied("Cannot read audit log"),
        })
    }

    pub(super) async fn write_audit_log(&self) -> ProbeResult {
        let outcome = self.read_audit_log().await?;

        Ok(match self.org {
            Some(org) if outcome.granted => {
                outcome.with_message(format!("Audit log write access assumed for {org}"))
            }
            _ => outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::MockServer;

    use crate::probe::{
        Prober, Scope,
        tests::{client, config, mount_json, mount_not_found},
    };

    #[tokio::test]
    async fn test_org_read() {
        let server = MockServer::start().await;
        mount_json(&server, "/orgs/acme", 200, json!({"login": "acme", "id": 1})).await;
        mount_json(
            &server,
            "/user/orgs",
            200,
            json!([{"login": "acme", "id": 1}, {"login": "globex", "id": 2}]),
        )
        .await;
        mount_not_found(&server).await;

        let config = config();
        let client = client(&server, &config);

        let named = Prober::new(&client, &config, Some("acme"), None)
            .run(Scope::ReadOrg)
            .await;
        assert_eq!(named.message, "Can read organization: acme");
        assert_eq!(named.details["org"], "acme");

        let unnamed = Prober::new(&client, &config, None, None)
            .run(Scope::ReadOrg)
            .await;
        assert_eq!(unnamed.message, "Can read 2 organizations");
        assert_eq!(unnamed.details["orgs"], json!(["acme", "globex"]));
    }

    #[tokio::test]
    async fn test_org_admin_falls_back_to_members() {
        let server = MockServer::start().await;
        mount_json(&server, "/orgs/acme/hooks", 403, json!({"message": "Must be an admin"})).await;
        mount_json(&server, "/orgs/acme/members", 200, json!([{"login": "a"}, {"login": "b"}])).await;
        mount_not_found(&server).await;

        let config = config();
        let client = client(&server, &config);
        let prober = Prober::new(&client, &config, Some("acme"), None);

        let result = prober.run(Scope::AdminOrg).await;
        assert!(result.granted);
        assert_eq!(result.message, "Can access org members (admin access likely)");
        assert_eq!(result.details["member_count"], 2);

        // The target organization refusing its webhook listing is the verdict.
        let hooks = prober.run(Scope::AdminOrgHook).await;
        assert!(!hooks.granted);
        assert!(!hooks.errored);
        assert_eq!(hooks.message, "Organization webhook access denied");
    }

    #[tokio::test]
    async fn test_org_hooks_sampled_orgs() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/user/orgs",
            200,
            json!([{"login": "acme"}, {"login": "globex"}]),
        )
        .await;
        mount_json(&server, "/orgs/acme/hooks", 403, json!({"message": "Must be an admin"})).await;
        mount_json(&server, "/orgs/globex/hooks", 200, json!([{"id": 9}])).await;
        mount_not_found(&server).await;

        let config = config();
        let client = client(&server, &config);
        let result = Prober::new(&client, &config, None, None)
            .run(Scope::ReadOrgHook)
            .await;

        assert_eq!(result.message, "Can read organization webhooks: globex");
        assert_eq!(result.details["hook_count"], 1);
    }

    #[tokio::test]
    async fn test_teams() {
        let server = MockServer::start().await;
        mount_json(&server, "/orgs/acme/teams", 200, json!([{"id": 42, "name": "Core", "slug": "core"}])).await;
        mount_json(&server, "/teams/42", 200, json!({"id": 42})).await;
        mount_json(&server, "/teams/42/members", 200, json!([])).await;
        mount_not_found(&server).await;

        let config = config();
        let client = client(&server, &config);
        let prober = Prober::new(&client, &config, Some("acme"), None);

        let write = prober.run(Scope::WriteOrg).await;
        assert_eq!(write.message, "Can manage teams and members in organization: acme");
        assert_eq!(write.details["team_count"], 1);

        let management = prober.run(Scope::TeamManagement).await;
        assert_eq!(management.message, "Can access teams in organization: acme");
    }

    #[tokio::test]
    async fn test_audit_log() {
        let server = MockServer::start().await;
        mount_json(&server, "/orgs/acme/audit-log", 200, json!([{"action": "repo.create"}])).await;
        mount_not_found(&server).await;

        let config = config();
        let client = client(&server, &config);
        let prober = Prober::new(&client, &config, Some("acme"), None);

        let read = prober.run(Scope::ReadAuditLog).await;
        assert_eq!(read.message, "Can read audit log for acme");
        assert_eq!(read.details["event_count"], 1);

        let write = prober.run(Scope::WriteAuditLog).await;
        assert!(write.granted);
        assert_eq!(write.message, "Audit log write access assumed for acme");
    }
}
