//! Enterprise self-hosted runner inventory.

use github_rest_models::actions::Runner;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::instrument;

use crate::github::{Client, ClientError};

/// Runner labels that get their own online/total tally.
const LABELS_OF_INTEREST: &[&str] = &["appsec", "appsec-dind"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub(crate) struct LabelTally {
    pub(crate) online: usize,
    pub(crate) total: usize,
}

/// A runner, reduced to the fields the summary reports.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct RunnerSummary {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) os: String,
    pub(crate) status: String,
    pub(crate) busy: bool,
    pub(crate) labels: Vec<String>,
    pub(crate) runner_group_id: Option<u64>,
    pub(crate) runner_group_name: Option<String>,
    pub(crate) architecture: Option<String>,
}

impl From<&Runner> for RunnerSummary {
    fn from(runner: &Runner) -> Self {
        Self {
            id: runner.id,
            name: runner.name.clone(),
            os: runner.os.clone(),
            status: runner.status.clone(),
            busy: runner.busy,
            labels: runner.label_names().map(String::from).collect(),
            runner_group_id: runner.runner_group_id,
            runner_group_name: runner.runner_group_name.clone(),
            architecture: runner.architecture.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub(crate) struct Distributions {
    pub(crate) os: IndexMap<String, usize>,
    pub(crate) architecture: IndexMap<String, usize>,
    pub(crate) runner_groups: IndexMap<String, usize>,
}

/// Aggregate view of an enterprise's runners.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct EnterpriseRunners {
    pub(crate) enterprise: String,
    pub(crate) total_runners: usize,
    pub(crate) online_runners: usize,
    pub(crate) offline_runners: usize,
    pub(crate) status_counts: IndexMap<String, usize>,
    pub(crate) label_counts: IndexMap<String, usize>,
    pub(crate) label_online_counts: IndexMap<String, usize>,
    pub(crate) labels_of_interest: IndexMap<&'static str, LabelTally>,
    pub(crate) distributions: Distributions,
    pub(crate) runners: Vec<RunnerSummary>,
}

impl EnterpriseRunners {
    pub(crate) fn summarize(enterprise: &str, runners: &[Runner]) -> Self {
        let mut status_counts = IndexMap::new();
        let mut label_counts = IndexMap::new();
        let mut label_online_counts = IndexMap::new();
        let mut distributions = Distributions::default();

        for runner in runners {
            *status_counts.entry(runner.status.to_lowercase()).or_default() += 1;

            let online = runner.is_online();
            for label in runner.label_names() {
                *label_counts.entry(label.to_string()).or_default() += 1;
                if online {
                    *label_online_counts.entry(label.to_string()).or_default() += 1;
                }
            }

            let or_unknown = |value: Option<&str>| {
                value
                    .filter(|v| !v.is_empty())
                    .unwrap_or("unknown")
                    .to_string()
            };
            *distributions.os.entry(or_unknown(Some(&runner.os))).or_default() += 1;
            *distributions
                .architecture
                .entry(or_unknown(runner.architecture.as_deref()))
                .or_default() += 1;
            *distributions
                .runner_groups
                .entry(
                    runner
                        .runner_group_name
                        .clone()
                        .filter(|g| !g.is_empty())
                        .unwrap_or_else(|| "default".into()),
                )
                .or_default() += 1;
        }

        let total_runners = runners.len();
        let online_runners = status_counts.get("online").copied().unwrap_or_default();

        let labels_of_interest = LABELS_OF_INTEREST
            .iter()
            .filter_map(|&label| {
                label_counts.get(label).map(|&total| {
                    (
                        label,
                        LabelTally {
                            online: label_online_counts.get(label).copied().unwrap_or_default(),
                            total,
                        },
                    )
                })
            })
            .collect();

        Self {
            enterprise: enterprise.into(),
            total_runners,
            online_runners,
            offline_runners: total_runners - online_runners,
            status_counts,
            label_counts,
            label_online_counts,
            labels_of_interest,
            distributions,
            runners: runners.iter().map(RunnerSummary::from).collect(),
        }
    }
}

/// Lists the runners registered to an enterprise, optionally stopping
/// after `max_pages` pages.
///
/// Returns `None` if the enterprise's runner listing doesn't exist, which
/// usually means a wrong slug or a non-enterprise instance.
#[instrument(skip(client))]
pub(crate) async fn list_enterprise_runners(
    client: &Client,
    slug: &str,
    max_pages: Option<usize>,
) -> Result<Option<EnterpriseRunners>, ClientError> {
    let runners = client
        .list::<Runner>(
            &format!("/enterprises/{slug}/actions/runners"),
            Some("runners"),
            max_pages,
        )
        .await?;

    Ok(runners.map(|runners| EnterpriseRunners::summarize(slug, &runners)))
}

#[cfg(test)]
mod tests {
    use github_rest_models::actions::{Runner, RunnerLabel};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::{EnterpriseRunners, LabelTally, list_enterprise_runners};
    use crate::{
        config::Config,
        github::{Client, GitHubToken},
    };

    fn runner(id: u64, status: &str, labels: &[&str]) -> Runner {
        Runner {
            id,
            name: format!("runner-{id}"),
            os: "Linux".into(),
            status: status.into(),
            labels: labels
                .iter()
                .map(|name| RunnerLabel {
                    name: name.to_string(),
                    kind: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_summarize() {
        let runners = [
            runner(1, "online", &["self-hosted", "appsec"]),
            runner(2, "Online", &["self-hosted", "appsec-dind"]),
            runner(3, "offline", &["self-hosted", "appsec", ""]),
        ];

        let summary = EnterpriseRunners::summarize("acme", &runners);

        assert_eq!(summary.total_runners, 3);
        assert_eq!(summary.online_runners, 2);
        assert_eq!(summary.offline_runners, 1);
        assert_eq!(summary.status_counts["online"], 2);
        assert_eq!(summary.label_counts["self-hosted"], 3);
        assert_eq!(summary.label_online_counts["self-hosted"], 2);
        assert!(!summary.label_counts.contains_key(""));
        assert_eq!(
            summary.labels_of_interest["appsec"],
            LabelTally {
                online: 1,
                total: 2
            }
        );
        assert_eq!(
            summary.labels_of_interest["appsec-dind"],
            LabelTally {
                online: 1,
                total: 1
            }
        );
        assert_eq!(summary.distributions.os["Linux"], 3);
        assert_eq!(summary.distributions.architecture["unknown"], 3);
        assert_eq!(summary.distributions.runner_groups["default"], 3);
        assert_eq!(summary.runners[2].labels, ["self-hosted", "appsec"]);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = EnterpriseRunners::summarize("acme", &[]);

        assert_eq!(summary.total_runners, 0);
        assert_eq!(summary.offline_runners, 0);
        assert!(summary.labels_of_interest.is_empty());
    }

    #[tokio::test]
    async fn test_list_enterprise_runners() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/enterprises/acme/actions/runners"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 2,
                "runners": [
                    {"id": 1, "name": "a", "os": "Linux", "status": "online", "busy": true,
                     "labels": [{"name": "appsec", "type": "custom"}]},
                    {"id": 2, "name": "b", "os": "Windows", "status": "offline", "busy": false,
                     "labels": []}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/enterprises/nope/actions/runners"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::new(
            &server.uri(),
            &GitHubToken::new("ghp_test").unwrap(),
            &Config::default(),
        )
        .unwrap();

        let summary = list_enterprise_runners(&client, "acme", Some(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.total_runners, 2);
        assert_eq!(summary.online_runners, 1);
        assert_eq!(summary.distributions.os["Windows"], 1);

        assert!(
            list_enterprise_runners(&client, "nope", Some(1))
                .await
                .unwrap()
                .is_none()
        );
    }
}
