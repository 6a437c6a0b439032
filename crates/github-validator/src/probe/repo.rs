//! Repository-level probes.

use github_rest_models::repos::{Branch, Repository};
use serde_json::Value;

use super::{ProbeOutcome, ProbeResult, Prober, best_effort};
use crate::{cache::params, github::ClientError};

/// How many repository names a count-style probe lists per permission.
const LISTED_REPOS: usize = 10;

fn listed<T>(names: &[T]) -> &[T] {
    &names[..names.len().min(LISTED_REPOS)]
}

impl Prober<'_> {
    pub(super) async fn repo_access(&self) -> ProbeResult {
        let repos = self.repos().await?;
        if repos.is_empty() {
            return Ok(ProbeOutcome::denied("Cannot access repositories"));
        }

        // Webhooks are sampled for context only; most tokens can't see them.
        let mut repos_with_hooks = vec![];
        for repo in self.sample_repos(repos, 1) {
            if let Some(hooks) = best_effort(
                self.listing(&format!("/repos/{}/hooks", repo.full_name), None)
                    .await,
            ) && !hooks.is_empty()
            {
                repos_with_hooks.push(repo.full_name.as_str());
            }
        }

        Ok(
            ProbeOutcome::granted(format!("Can access {} repositories", repos.len()))
                .detail("repo_count", repos.len())
                .detail("repos_with_hooks", repos_with_hooks),
        )
    }

    /// The first sampled repository whose full view reports admin rights.
    async fn first_admin_repo(&self) -> Result<Option<&str>, ClientError> {
        for repo in self.sample_repos(self.repos().await?, 1) {
            let detailed = best_effort(
                self.client
                    .get_as::<Repository>(&format!("/repos/{}", repo.full_name))
                    .await,
            );
            if detailed.is_some_and(|detailed| detailed.is_admin()) {
                return Ok(Some(repo.full_name.as_str()));
            }
        }

        Ok(None)
    }

    pub(super) async fn repo_write(&self) -> ProbeResult {
        let private = self.repos().await?.iter().filter(|r| r.private).count();
        if private > 0 {
            return Ok(
                ProbeOutcome::granted("Can access private repositories (write access likely)")
                    .detail("private_repo_count", private),
            );
        }

        Ok(match self.first_admin_repo().await? {
            Some(repo) => ProbeOutcome::granted("Has admin access to repositories")
                .detail("admin_repos", [repo]),
            None => ProbeOutcome::denied("No write/admin access detected"),
        })
    }

    pub(super) async fn repo_delete(&self) -> ProbeResult {
        Ok(match self.first_admin_repo().await? {
            Some(repo) => ProbeOutcome::granted("Has admin access (can delete repositories)")
                .detail("admin_repos", [repo]),
            None => ProbeOutcome::denied("No delete repository access detected"),
        })
    }

    /// Lists `/repos/{repo}/{suffix}` for each sampled repository and
    /// returns the first listing that exists.
    pub(super) async fn first_repo_listing(
        &self,
        suffix: &str,
        field: Option<&str>,
    ) -> Result<Option<(&str, Vec<Value>)>, ClientError> {
        for repo in self.sample_repos(self.repos().await?, 1) {
            if let Some(items) = best_effort(
                self.listing(&format!("/repos/{}/{suffix}", repo.full_name), field)
                    .await,
            ) {
                return Ok(Some((repo.full_name.as_str(), items)));
            }
        }

        Ok(None)
    }

    pub(super) async fn repo_hooks_admin(&self) -> ProbeResult {
        Ok(match self.first_repo_listing("hooks", None).await? {
            Some((repo, hooks)) => ProbeOutcome::granted("Can manage repository webhooks")
                .detail("repo", repo)
                .detail("hook_count", hooks.len()),
            None => ProbeOutcome::denied("Cannot manage repository webhooks"),
        })
    }

    pub(super) async fn repo_hooks_write(&self) -> ProbeResult {
        let outcome = self.repo_hooks_admin().await?;

        Ok(if outcome.granted {
            outcome.with_message("Can manage repository webhooks (write access)")
        } else {
            ProbeOutcome::denied("Cannot write repository webhooks")
        })
    }

    pub(super) async fn repo_hooks_read(&self) -> ProbeResult {
        Ok(match self.first_repo_listing("hooks", None).await? {
            Some((repo, hooks)) => ProbeOutcome::granted("Can read repository webhooks")
                .detail("repo", repo)
                .detail("hook_count", hooks.len()),
            None => ProbeOutcome::denied("Cannot read repository webhooks"),
        })
    }

    pub(super) async fn issues(&self) -> ProbeResult {
        let query = params([("state", "open"), ("per_page", "1")]);

        for repo in self.sample_repos(self.repos().await?, 1) {
            let issues = best_effort(
                self.client
                    .get_with(&format!("/repos/{}/issues", repo.full_name), &query, true)
                    .await,
            );
            if issues.is_some() {
                return Ok(ProbeOutcome::granted("Can access issues and pull requests")
                    .detail("repo", &repo.full_name));
            }
        }

        Ok(ProbeOutcome::denied("Cannot access issues"))
    }

    pub(super) async fn repo_status(&self) -> ProbeResult {
        for repo in self.sample_repos(self.repos().await?, 1) {
            let statuses = best_effort(
                self.client
                    .get(&format!(
                        "/repos/{}/commits/{}/statuses",
                        repo.full_name,
                        repo.default_branch_or_main()
                    ))
                    .await,
            );
            if statuses.is_some() {
                return Ok(ProbeOutcome::granted("Can access commit statuses")
                    .detail("repo", &repo.full_name));
            }
        }

        Ok(ProbeOutcome::denied("Cannot access commit statuses"))
    }

    pub(super) async fn repo_deployment(&self) -> ProbeResult {
        Ok(match self.first_repo_listing("deployments", None).await? {
            Some((repo, deployments)) => ProbeOutcome::granted("Can access deployments")
                .detail("repo", repo)
                .detail("deployment_count", deployments.len()),
            None => ProbeOutcome::denied("Cannot access deployments"),
        })
    }

    pub(super) async fn public_repo(&self) -> ProbeResult {
        let public = self.repos().await?.iter().filter(|r| !r.private).count();

        Ok(if public > 0 {
            ProbeOutcome::granted(format!("Can access {public} public repositories"))
                .detail("public_repo_count", public)
        } else {
            ProbeOutcome::denied("Cannot access public repositories")
        })
    }

    pub(super) async fn repo_invite(&self) -> ProbeResult {
        Ok(match self.listing("/user/repository_invitations", None).await? {
            Some(invitations) => ProbeOutcome::granted(format!(
                "Can access {} repository invitations",
                invitations.len()
            ))
            .detail("invitation_count", invitations.len()),
            None => ProbeOutcome::denied("Cannot access repository invitations"),
        })
    }

    pub(super) async fn branch_protection(&self) -> ProbeResult {
        for repo in self.sample_repos(self.repos().await?, 1) {
            let branches = best_effort(
                self.client
                    .get_as::<Vec<Branch>>(&format!("/repos/{}/branches", repo.full_name))
                    .await,
            )
            .unwrap_or_default();

            // The default branch if it's listed, else any protected one.
            let Some(branch) = branches
                .iter()
                .find(|branch| branch.name == repo.default_branch_or_main())
                .or_else(|| branches.iter().find(|branch| branch.protected))
                .or(branches.first())
            else {
                continue;
            };

            let protection = self
                .client
                .get(&format!(
                    "/repos/{}/branches/{}/protection",
                    repo.full_name, branch.name
                ))
                .await;
            match protection {
                Ok(Some(_)) => {
                    return Ok(ProbeOutcome::granted("Can access branch protection rules")
                        .detail("repo", &repo.full_name)
                        .detail("branch", &branch.name));
                }
                // An unprotected branch says nothing either way.
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!("branch protection unreadable: {err}");
                    return Ok(
                        ProbeOutcome::granted("Can access branches (protection access likely)")
                            .detail("repo", &repo.full_name)
                            .detail("branch", &branch.name),
                    );
                }
            }
        }

        Ok(ProbeOutcome::denied("Cannot access branch protection"))
    }

    pub(super) async fn repo_access_count(&self) -> ProbeResult {
        let repos = self.repos().await?;
        if repos.is_empty() {
            return Ok(ProbeOutcome::denied("Cannot access repositories"));
        }

        let private = repos.iter().filter(|r| r.private).count();
        let archived = repos.iter().filter(|r| r.archived).count();

        let mut admin = vec![];
        let mut push = vec![];
        let mut pull = vec![];
        for repo in self.sample_repos(repos, 10) {
            let Some(detailed) = best_effort(
                self.client
                    .get_as::<Repository>(&format!("/repos/{}", repo.full_name))
                    .await,
            ) else {
                continue;
            };

            let permissions = detailed.permissions.unwrap_or_default();
            let name = repo.full_name.as_str();
            if permissions.admin {
                admin.push(name);
            }
            if permissions.push {
                push.push(name);
            }
            if permissions.pull {
                pull.push(name);
            }
        }

        Ok(
            ProbeOutcome::granted(format!("Has access to {} repositories", repos.len()))
                .detail("total_repos", repos.len())
                .detail("private_repos", private)
                .detail("public_repos", repos.len() - private)
                .detail("archived_repos", archived)
                .detail("repos_with_admin", admin.len())
                .detail("repos_with_push", push.len())
                .detail("repos_with_pull", pull.len())
                .detail("sample_admin_repos", listed(&admin))
                .detail("sample_push_repos", listed(&push))
                .detail("sample_pull_repos", listed(&pull)),
        )
    }
}
