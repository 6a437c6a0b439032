//! Probes for the authenticated user's own resources.

use github_rest_models::users::Email;

use super::{ProbeOutcome, ProbeResult, Prober, best_effort, truthy};
use crate::cache::params;

impl Prober<'_> {
    pub(super) async fn user_info(&self) -> ProbeResult {
        Ok(match self.client.get("/user").await? {
            Some(user) if truthy(&user) => ProbeOutcome::granted("Can access user information")
                .detail("username", &user["login"]),
            _ => ProbeOutcome::denied("Cannot access user information"),
        })
    }

    pub(super) async fn user_full_profile(&self) -> ProbeResult {
        let outcome = self.user_info().await?;
        if !outcome.granted {
            return Ok(outcome);
        }

        Ok(match best_effort(self.listing("/user/emails", None).await) {
            Some(emails) => outcome
                .detail("email_count", emails.len())
                .with_message("Can access full user profile information"),
            None => outcome,
        })
    }

    pub(super) async fn gists(&self) -> ProbeResult {
        Ok(match self.listing("/gists", None).await? {
            Some(gists) if !gists.is_empty() => {
                ProbeOutcome::granted(format!("Can access {} gists", gists.len()))
                    .detail("gist_count", gists.len())
            }
            _ => ProbeOutcome::denied("Cannot access gists"),
        })
    }

    pub(super) async fn packages_read(&self) -> ProbeResult {
        // The packages listing insists on a package type.
        let packages = self
            .client
            .paginate(
                "/user/packages",
                &params([("package_type", "container")]),
                None,
                None,
            )
            .await?;

        Ok(match packages {
            Some(packages) if !packages.is_empty() => {
                ProbeOutcome::granted(format!("Can access {} packages", packages.len()))
                    .detail("package_count", packages.len())
            }
            _ => ProbeOutcome::denied("Cannot access packages"),
        })
    }

    pub(super) async fn packages_write(&self) -> ProbeResult {
        self.packages_read().await
    }

    pub(super) async fn packages_delete(&self) -> ProbeResult {
        self.packages_read().await
    }

    pub(super) async fn notifications(&self) -> ProbeResult {
        Ok(match self.listing("/notifications", None).await? {
            Some(notifications) => ProbeOutcome::granted(format!(
                "Can access {} notifications",
                notifications.len()
            ))
            .detail("notification_count", notifications.len()),
            None => ProbeOutcome::denied("Cannot access notifications"),
        })
    }

    pub(super) async fn user_emails(&self) -> ProbeResult {
        Ok(
            match self.client.list::<Email>("/user/emails", None, None).await? {
                Some(emails) if !emails.is_empty() => {
                    let primary = emails.iter().find(|email| email.primary);
                    ProbeOutcome::granted(format!("Can access {} email addresses", emails.len()))
                        .detail("email_count", emails.len())
                        .detail(
                            "verified_count",
                            emails.iter().filter(|email| email.verified).count(),
                        )
                        .detail("primary_email", primary.map(|email| email.email.as_str()))
                }
                _ => ProbeOutcome::denied("Cannot access user emails"),
            },
        )
    }

    pub(super) async fn user_follow(&self) -> ProbeResult {
        Ok(match self.listing("/user/following", None).await? {
            Some(following) => ProbeOutcome::granted(format!(
                "Can access following list ({} users)",
                following.len()
            ))
            .detail("following_count", following.len()),
            None => ProbeOutcome::denied("Cannot access follow information"),
        })
    }

    pub(super) async fn gpg_keys_read(&self) -> ProbeResult {
        Ok(match self.listing("/user/gpg_keys", None).await? {
            Some(keys) => ProbeOutcome::granted(format!("Can access {} GPG keys", keys.len()))
                .detail("gpg_key_count", keys.len()),
            None => ProbeOutcome::denied("Cannot access GPG keys"),
        })
    }

    pub(super) async fn gpg_keys_admin(&self) -> ProbeResult {
        self.gpg_keys_read().await
    }

    pub(super) async fn gpg_keys_write(&self) -> ProbeResult {
        let outcome = self.gpg_keys_read().await?;
        Ok(if outcome.granted {
            outcome.with_message("Can manage GPG keys (write access assumed)")
        } else {
            outcome
        })
    }

    pub(super) async fn ssh_keys_read(&self) -> ProbeResult {
        Ok(match self.listing("/user/keys", None).await? {
            Some(keys) => ProbeOutcome::granted(format!("Can access {} SSH keys", keys.len()))
                .detail("ssh_key_count", keys.len()),
            None => ProbeOutcome::denied("Cannot access SSH keys"),
        })
    }

    pub(super) async fn ssh_keys_admin(&self) -> ProbeResult {
        self.ssh_keys_read().await
    }

    pub(super) async fn ssh_keys_write(&self) -> ProbeResult {
        let outcome = self.ssh_keys_read().await?;
        Ok(if outcome.granted {
            outcome.with_message("Can manage SSH keys (write access assumed)")
        } else {
            outcome
        })
    }
}
