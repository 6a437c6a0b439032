//! Codespaces.

use serde::{Deserialize, Serialize};

/// The response from `GET /user/codespaces`.
///
/// Individual codespaces are kept as raw JSON, since only their
/// count and presence matter.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CodespaceList {
    pub total_count: u64,
    pub codespaces: Vec<serde_json::Value>,
}
