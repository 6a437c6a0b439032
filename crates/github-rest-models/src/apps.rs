//! GitHub App installations visible to the authenticated user.

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Installation {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub app_id: u64,
    #[serde(default)]
    pub app_slug: String,
    /// `User` or `Organization`.
    #[serde(default)]
    pub target_type: String,
    pub account: Option<Account>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Account {
    #[serde(default)]
    pub login: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// The response from `GET /user/installations`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct InstallationList {
    pub total_count: u64,
    pub installations: Vec<Installation>,
}
