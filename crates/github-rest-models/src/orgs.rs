//! Organizations and teams.

use serde::{Deserialize, Serialize};

/// An organization, from `GET /user/orgs` or `GET /orgs/{org}`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Organization {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub id: u64,
    pub description: Option<String>,
}

/// A team, from `GET /orgs/{org}/teams`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Team {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}
