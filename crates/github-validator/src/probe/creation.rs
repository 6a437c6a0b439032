//! The opt-in repository creation check.
//!
//! Unlike the scope probes, this check writes: it creates a private
//! throwaway repository under the token's user, tags it to confirm write
//! access, and deletes it again.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::instrument;

use super::Prober;
use crate::{errors::render_chain, github::ClientError};

/// The name of the repository the creation check creates and deletes.
pub(crate) const THROWAWAY_REPO: &str = "github-validator-creation-check";

const THROWAWAY_TOPIC: &str = "github-validator";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CreationResult {
    Success,
    Forbidden,
    ValidationError,
    Error,
}

/// What the repository creation check observed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct CreationTest {
    pub(crate) result: CreationResult,
    pub(crate) message: String,
    pub(crate) http_code: Option<u16>,
    /// The `owner/name` of the created repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) repository: Option<String>,
    /// The created repository's topics could be replaced.
    pub(crate) write_confirmed: bool,
    /// The created repository was deleted again.
    pub(crate) cleaned_up: bool,
}

impl CreationTest {
    fn refused(err: &ClientError) -> Self {
        let status = err.status();
        let (result, message) = match status {
            Some(StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED) => (
                CreationResult::Forbidden,
                "Repository creation forbidden: insufficient permissions".to_string(),
            ),
            Some(StatusCode::UNPROCESSABLE_ENTITY) => (
                CreationResult::ValidationError,
                format!("Repository creation rejected: {}", render_chain(err)),
            ),
            _ => (
                CreationResult::Error,
                format!("Repository creation error: {}", render_chain(err)),
            ),
        };

        Self {
            result,
            message,
            http_code: status.map(|status| status.as_u16()),
            repository: None,
            write_confirmed: false,
            cleaned_up: false,
        }
    }
}

impl Prober<'_> {
    /// Creates, tags and deletes a private throwaway repository.
    ///
    /// Never fails: every refusal or error is folded into the returned
    /// [`CreationTest`].
    #[instrument(skip(self))]
    pub(crate) async fn creation_test(&self) -> CreationTest {
        let body = json!({
            "name": THROWAWAY_REPO,
            "description": "Temporary repository created by github-validator",
            "private": true,
            "auto_init": false,
        });

        let created = match self.client.post("/user/repos", &body).await {
            Ok(created) => created,
            Err(err) => return CreationTest::refused(&err),
        };

        let Some(full_name) = created.get("full_name").and_then(Value::as_str) else {
            return CreationTest {
                result: CreationResult::ValidationError,
                message: "Repository creation returned no repository".into(),
                http_code: Some(StatusCode::CREATED.as_u16()),
                repository: None,
                write_confirmed: false,
                cleaned_up: false,
            };
        };

        let write_confirmed = match self
            .client
            .put(
                &format!("/repos/{full_name}/topics"),
                &json!({"names": [THROWAWAY_TOPIC]}),
            )
            .await
        {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!("couldn't tag {full_name}: {err}");
                false
            }
        };

        let cleaned_up = match self.client.delete(&format!("/repos/{full_name}")).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::debug!("couldn't delete {full_name}: {err}");
                false
            }
        };
        if !cleaned_up {
            tracing::warn!("couldn't delete the throwaway repository {full_name}: remove it by hand");
        }

        CreationTest {
            result: CreationResult::Success,
            message: "Repository creation succeeded".into(),
            http_code: Some(StatusCode::CREATED.as_u16()),
            repository: Some(full_name.into()),
            write_confirmed,
            cleaned_up,
        }
    }
}
