//! Repositories.
//!
//! Resources:
//! * [Repositories](https://docs.github.com/en/rest/repos/repos)

use serde::{Deserialize, Serialize};

/// A repository, from either a listing (`GET /user/repos`) or a
/// single-resource fetch (`GET /repos/{owner}/{repo}`).
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Repository {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// `owner/repo`.
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
    pub default_branch: Option<String>,
    /// The authenticated user's permissions on this repository.
    ///
    /// Only present when the request was authenticated.
    pub permissions: Option<RepositoryPermissions>,
}

impl Repository {
    /// The repository's default branch, falling back to `main`
    /// when the API doesn't report one.
    pub fn default_branch_or_main(&self) -> &str {
        self.default_branch.as_deref().unwrap_or("main")
    }

    /// Whether the authenticated user has admin rights on this repository.
    pub fn is_admin(&self) -> bool {
        self.permissions.as_ref().is_some_and(|p| p.admin)
    }
}

/// Per-repository permission flags for the authenticated user.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(default)]
pub struct RepositoryPermissions {
    pub admin: bool,
    pub maintain: bool,
    pub push: bool,
    pub triage: bool,
    pub pull: bool,
}

/// A branch summary from `GET /repos/{owner}/{repo}/branches`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Branch {
    pub name: String,
    pub protected: bool,
}
