//! GitHub Actions resources: runners, workflows and secrets.
//!
//! Resources:
//! * [Self-hosted runners](https://docs.github.com/en/rest/actions/self-hosted-runners)
//! * [Workflows](https://docs.github.com/en/rest/actions/workflows)
//! * [Secrets](https://docs.github.com/en/rest/actions/secrets)

use serde::{Deserialize, Serialize};

/// A self-hosted runner, at repository, organization or enterprise level.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Runner {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub os: String,
    /// `online` or `offline`, in practice.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub busy: bool,
    #[serde(default)]
    pub labels: Vec<RunnerLabel>,
    pub runner_group_id: Option<u64>,
    pub runner_group_name: Option<String>,
    pub architecture: Option<String>,
}

impl Runner {
    /// Runner statuses are compared case-insensitively.
    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("online")
    }

    /// The names of this runner's labels, skipping unnamed ones.
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .map(|label| label.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RunnerLabel {
    #[serde(default)]
    pub name: String,
    /// `read-only` for default labels, `custom` otherwise.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// A page of runners. The runner endpoints wrap their listings
/// in an object rather than returning a bare array.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RunnerList {
    pub total_count: u64,
    pub runners: Vec<Runner>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Workflow {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct WorkflowList {
    pub total_count: u64,
    pub workflows: Vec<Workflow>,
}

/// An Actions (or Codespaces) secret. Values are never returned by the API,
/// only names and timestamps.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Secret {
    #[serde(default)]
    pub name: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Only present on organization secrets: `all`, `private` or `selected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SecretList {
    pub total_count: u64,
    pub secrets: Vec<Secret>,
}
