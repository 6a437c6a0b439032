//! Users and their account-level resources.
//!
//! Resources:
//! * [Users](https://docs.github.com/en/rest/users/users)

use serde::{Deserialize, Serialize};

/// The authenticated user, as returned by `GET /user`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct User {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub id: u64,
    /// `User`, `Organization` or `Bot`.
    #[serde(default, rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub site_admin: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// A single entry from `GET /user/emails`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Email {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
    pub visibility: Option<String>,
}
