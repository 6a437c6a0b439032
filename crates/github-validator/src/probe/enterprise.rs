//! Enterprise-account probes. Most of these endpoints only exist on
//! GitHub Enterprise Server, so a 404 is the usual answer on github.com.

use super::{ProbeOutcome, ProbeResult, Prober, best_effort, truthy};
use crate::runners::list_enterprise_runners;

impl Prober<'_> {
    /// Whether `endpoint` answers with a non-empty body. Failures count as no.
    async fn answers(&self, endpoint: &str) -> bool {
        best_effort(self.client.get(endpoint).await)
            .as_ref()
            .is_some_and(truthy)
    }

    pub(super) async fn enterprise_admin(&self) -> ProbeResult {
        Ok(match self.client.get("/enterprise/settings").await? {
            Some(settings) if truthy(&settings) => {
                ProbeOutcome::granted("Has enterprise admin access")
            }
            _ => ProbeOutcome::denied("No enterprise admin access"),
        })
    }

    pub(super) async fn admin_enterprise(&self) -> ProbeResult {
        Ok(if self.answers("/enterprise/settings").await {
            ProbeOutcome::granted("Has enterprise admin access")
        } else if self.answers("/enterprise/stats/all").await {
            ProbeOutcome::granted("Can access enterprise statistics")
        } else {
            ProbeOutcome::denied("No enterprise admin access")
        })
    }

    pub(super) async fn manage_billing_enterprise(&self) -> ProbeResult {
        Ok(if self.answers("/enterprise/billing").await {
            ProbeOutcome::granted("Can manage enterprise billing")
        } else {
            ProbeOutcome::denied("Cannot manage enterprise billing")
        })
    }

    pub(super) async fn read_enterprise(&self) -> ProbeResult {
        Ok(if self.answers("/enterprise/settings").await {
            ProbeOutcome::granted("Can read enterprise settings")
        } else if self.answers("/enterprise/stats/all").await {
            ProbeOutcome::granted("Can read enterprise statistics")
        } else {
            ProbeOutcome::denied("Cannot read enterprise data")
        })
    }

    /// Lists a single page of the enterprise's runners.
    pub(super) async fn manage_runners_enterprise(&self) -> ProbeResult {
        let Some(slug) = self.enterprise else {
            return Ok(ProbeOutcome::denied(
                "Enterprise slug required for runner management checks",
            ));
        };

        Ok(match list_enterprise_runners(self.client, slug, Some(1)).await? {
            Some(summary) => {
                ProbeOutcome::granted(format!("Can manage enterprise runners for {slug}"))
                    .detail("enterprise", slug)
                    .detail("runner_count", summary.total_runners)
            }
            None => ProbeOutcome::denied("Enterprise runners API not available (check slug)"),
        })
    }

    pub(super) async fn read_runners_enterprise(&self) -> ProbeResult {
        let outcome = self.manage_runners_enterprise().await?;

        Ok(if outcome.granted {
            outcome.with_message("Can read enterprise runner metadata")
        } else {
            outcome
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
    async fn test_enterprise_server_endpoints() {
        let server = MockServer::start().await;
        mount_json(&server, "/enterprise/settings", 403, json!({"message": "Forbidden"})).await;
        mount_json(&server, "/enterprise/stats/all", 200, json!({"repos": {"total_repos": 12}})).await;
        mount_json(&server, "/enterprise/billing", 200, json!({})).await;
        mount_not_found(&server).await;

        let config = config();
        let client = client(&server, &config);
        let prober = Prober::new(&client, &config, None, None);

        // Only `enterprise_admin` lets a refusal decide the verdict.
        let strict = prober.run(Scope::EnterpriseAdmin).await;
        assert!(!strict.granted);
        assert_eq!(strict.message, "Enterprise admin access denied");

        let admin = prober.run(Scope::AdminEnterprise).await;
        assert!(admin.granted);
        assert_eq!(admin.message, "Can access enterprise statistics");

        let read = prober.run(Scope::ReadEnterprise).await;
        assert_eq!(read.message, "Can read enterprise statistics");

        // An empty billing object isn't evidence of anything.
        let billing = prober.run(Scope::ManageBillingEnterprise).await;
        assert!(!billing.granted);
        assert_eq!(billing.message, "Cannot manage enterprise billing");
    }

    #[tokio::test]
    async fn test_enterprise_runners() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/enterprises/acme/actions/runners",
            200,
            json!({"total_count": 1, "runners": [
                {"id": 1, "name": "build-1", "os": "Linux", "status": "online", "busy": false, "labels": []}
            ]}),
        )
        .await;
        mount_json(
            &server,
            "/enterprises/initech/actions/runners",
            403,
            json!({"message": "Must be an enterprise admin"}),
        )
        .await;
        mount_not_found(&server).await;

        let config = config();
        let client = client(&server, &config);

        let acme = Prober::new(&client, &config, None, Some("acme"));
        let manage = acme.run(Scope::ManageRunnersEnterprise).await;
        assert!(manage.granted);
        assert_eq!(manage.message, "Can manage enterprise runners for acme");
        assert_eq!(manage.details["runner_count"], 1);
        assert_eq!(
            acme.run(Scope::ReadRunnersEnterprise).await.message,
            "Can read enterprise runner metadata"
        );

        let initech = Prober::new(&client, &config, None, Some("initech"));
        assert_eq!(
            initech.run(Scope::ReadRunnersEnterprise).await.message,
            "Enterprise runners management denied"
        );

        let missing = Prober::new(&client, &config, None, Some("nope"));
        assert_eq!(
            missing.run(Scope::ManageRunnersEnterprise).await.message,
            "Enterprise runners API not available (check slug)"
        );
    }
}
