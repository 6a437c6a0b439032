//! Rate limit status.
//!
//! Resources:
//! * [Rate limit](https://docs.github.com/en/rest/rate-limit/rate-limit)

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The response from `GET /rate_limit`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RateLimitOverview {
    #[serde(default)]
    pub resources: RateLimitResources,
    /// Mirrors `resources.core`; kept by the API for compatibility.
    #[serde(default)]
    pub rate: RateLimitResource,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RateLimitResources {
    #[serde(default)]
    pub core: RateLimitResource,
    pub search: Option<RateLimitResource>,
    pub graphql: Option<RateLimitResource>,
    /// Everything else (`integration_manifest`, `code_scanning_upload`, ...).
    #[serde(flatten)]
    pub other: IndexMap<String, RateLimitResource>,
}

/// A single rate-limited resource bucket.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(default)]
pub struct RateLimitResource {
    pub limit: u64,
    pub remaining: u64,
    /// Unix epoch seconds at which the window resets.
    pub reset: u64,
    pub used: u64,
}
