//! GitHub Actions probes: workflows and self-hosted runners.

use github_rest_models::actions::{Runner, WorkflowList};
use serde::Serialize;

use super::{ProbeOutcome, ProbeResult, Prober, best_effort};
use crate::github::ClientError;

/// Runners listed per repository in `runners_repo` details.
const RUNNERS_PER_REPO: usize = 5;
/// Runners listed for the target organization in `runners_org` details.
const RUNNERS_PER_ORG: usize = 10;

#[derive(Serialize)]
struct RunnerBrief<'a> {
    id: u64,
    name: &'a str,
    os: &'a str,
    status: &'a str,
    busy: bool,
}

impl<'a> From<&'a Runner> for RunnerBrief<'a> {
    fn from(runner: &'a Runner) -> Self {
        Self {
            id: runner.id,
            name: &runner.name,
            os: &runner.os,
            status: &runner.status,
            busy: runner.busy,
        }
    }
}

fn briefs(runners: &[Runner], limit: usize) -> Vec<RunnerBrief<'_>> {
    runners.iter().take(limit).map(RunnerBrief::from).collect()
}

#[derive(Serialize)]
struct RepoRunners<'a> {
    repo: &'a str,
    runner_count: usize,
    runners: Vec<RunnerBrief<'a>>,
}

#[derive(Serialize)]
struct OrgRunners<'a> {
    org: &'a str,
    runner_count: usize,
}

impl Prober<'_> {
    async fn runners(&self, endpoint: &str) -> Result<Option<Vec<Runner>>, ClientError> {
        self.client.list::<Runner>(endpoint, Some("runners"), None).await
    }

    pub(super) async fn workflows(&self) -> ProbeResult {
        let mut workflow_repos = vec![];
        for repo in self.sample_repos(self.repos().await?, 2) {
            let workflows = best_effort(
                self.client
                    .get_as::<WorkflowList>(&format!("/repos/{}/actions/workflows", repo.full_name))
                    .await,
            );
            if workflows.is_some_and(|list| !list.workflows.is_empty()) {
                workflow_repos.push(repo.full_name.as_str());
            }
        }

        Ok(if workflow_repos.is_empty() {
            ProbeOutcome::denied("Cannot access workflows")
        } else {
            ProbeOutcome::granted(format!(
                "Can access workflows in {} repositories",
                workflow_repos.len()
            ))
            .detail("workflow_repos", workflow_repos)
        })
    }

    pub(super) async fn runners_repo(&self) -> ProbeResult {
        let repos = self.sample_repos(self.repos().await?, 2);

        let mut listings = vec![];
        for repo in repos {
            if let Some(runners) = best_effort(
                self.runners(&format!("/repos/{}/actions/runners", repo.full_name))
                    .await,
            ) && !runners.is_empty()
            {
                listings.push((repo.full_name.as_str(), runners));
            }
        }

        if listings.is_empty() {
            return Ok(ProbeOutcome::denied("Cannot access repository runners"));
        }

        let total_runners: usize = listings.iter().map(|(_, runners)| runners.len()).sum();
        let repos_with_runners = listings
            .iter()
            .map(|(repo, runners)| RepoRunners {
                repo: *repo,
                runner_count: runners.len(),
                runners: briefs(runners, RUNNERS_PER_REPO),
            })
            .collect::<Vec<_>>();

        Ok(ProbeOutcome::granted(format!(
            "Can access runners in {} repositories (total: {total_runners} runners)",
            listings.len()
        ))
        .detail("repo_count", listings.len())
        .detail("total_runners", total_runners)
        .detail("repos_with_runners", repos_with_runners))
    }

    pub(super) async fn runners_org(&self) -> ProbeResult {
        if let Some(org) = self.org
            && let Some(runners) = best_effort(
                self.runners(&format!("/orgs/{org}/actions/runners"))
                    .await,
            )
        {
            return Ok(ProbeOutcome::granted(format!(
                "Can access {} organization runners: {org}",
                runners.len()
            ))
            .detail("org", org)
            .detail("runner_count", runners.len())
            .detail("runners", briefs(&runners, RUNNERS_PER_ORG)));
        }

        let mut orgs_with_runners = vec![];
        for org in self.sample_orgs(self.orgs().await?) {
            if let Some(runners) = best_effort(
                self.runners(&format!("/orgs/{}/actions/runners", org.login))
                    .await,
            ) && !runners.is_empty()
            {
                orgs_with_runners.push(OrgRunners {
                    org: &org.login,
                    runner_count: runners.len(),
                });
            }
        }

        if orgs_with_runners.is_empty() {
            return Ok(ProbeOutcome::denied("Cannot access organization runners"));
        }

        let total_runners: usize = orgs_with_runners.iter().map(|o| o.runner_count).sum();
        Ok(ProbeOutcome::granted(format!(
            "Can access organization runners in {} orgs (total: {total_runners} runners)",
            orgs_with_runners.len()
        ))
        .detail("org_count", orgs_with_runners.len())
        .detail("total_runners", total_runners)
        .detail("orgs_with_runners", orgs_with_runners))
    }
}
