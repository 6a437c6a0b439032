//! Codespaces probes.

use github_rest_models::codespaces::CodespaceList;
use serde_json::Value;

use super::{ProbeOutcome, ProbeResult, Prober};
use crate::cache::params;

impl Prober<'_> {
    pub(super) async fn codespaces(&self) -> ProbeResult {
        let Some(codespaces) = self.client.get("/user/codespaces").await? else {
            return Ok(ProbeOutcome::denied("Codespaces API unavailable"));
        };

        let count = codespaces["codespaces"].as_array().map_or(0, Vec::len);
        Ok(
            ProbeOutcome::granted(format!("Can access Codespaces (count: {count})"))
                .detail("codespaces", codespaces),
        )
    }

    pub(super) async fn codespaces_metadata(&self) -> ProbeResult {
        let metadata = self
            .client
            .get_with("/user/codespaces", &params([("per_page", "1")]), true)
            .await?;

        Ok(match metadata {
            Some(metadata) => {
                ProbeOutcome::granted("Can read Codespaces metadata").detail("metadata", metadata)
            }
            None => ProbeOutcome::denied("Cannot read Codespaces metadata"),
        })
    }

    /// Secret names only; the API never returns values.
    pub(super) async fn codespaces_user(&self) -> ProbeResult {
        Ok(match self.client.get("/user/codespaces/secrets").await? {
            Some(secrets) => {
                let names = secrets["secrets"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|secret| secret["name"].clone())
                    .collect::<Vec<Value>>();

                ProbeOutcome::granted("Can read Codespaces user secrets")
                    .detail("secret_names", names)
            }
            None => ProbeOutcome::denied("Cannot access Codespaces secrets"),
        })
    }

    pub(super) async fn codespaces_lifecycle_admin(&self) -> ProbeResult {
        let list = self.client.get_as::<CodespaceList>("/user/codespaces").await?;

        Ok(match list {
            Some(list) if !list.codespaces.is_empty() => {
                ProbeOutcome::granted("Can administer Codespaces lifecycle")
                    .detail("codespaces", list.codespaces)
            }
            _ => ProbeOutcome::denied("No Codespaces lifecycle access detected"),
        })
    }
}
