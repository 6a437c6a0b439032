//! Rate-limit bookkeeping and status reporting.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use github_rest_models::rate_limit::{RateLimitOverview, RateLimitResource};
use reqwest::header::HeaderMap;
use serde::Serialize;

/// The most recent rate-limit figures reported by GitHub's response headers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub(crate) struct RateLimitState {
    pub(crate) limit: Option<u64>,
    pub(crate) remaining: Option<u64>,
    pub(crate) used: Option<u64>,
    /// Unix epoch seconds at which the current window resets.
    pub(crate) reset: Option<u64>,
}

impl RateLimitState {
    /// Folds any `X-RateLimit-*` headers present in `headers` into this state.
    ///
    /// Absent or malformed headers leave the previous figure in place.
    pub(crate) fn observe(&mut self, headers: &HeaderMap) {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };

        if let Some(limit) = read("x-ratelimit-limit") {
            self.limit = Some(limit);
        }
        if let Some(remaining) = read("x-ratelimit-remaining") {
            self.remaining = Some(remaining);
        }
        if let Some(used) = read("x-ratelimit-used") {
            self.used = Some(used);
        }
        if let Some(reset) = read("x-ratelimit-reset") {
            self.reset = Some(reset);
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

pub(crate) fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// The longest single wait the client will sleep through. GitHub's
/// rate-limit windows are an hour long, so a reset further out than
/// that is a bogus header.
pub(crate) const MAX_WAIT: Duration = Duration::from_secs(60 * 60);

/// How long to wait for a window resetting at `reset` to open again:
/// `max(0, reset - now + 1)` seconds.
pub(crate) fn wait_duration(reset: u64, now: u64) -> Duration {
    Duration::from_secs(reset.saturating_add(1).saturating_sub(now))
}

/// The delay before retry number `attempt` (zero-based) of a request that hit
/// an exhausted rate limit.
///
/// The first retry waits exactly until the reset; later retries add an
/// exponentially growing `backoff` on top of it. Never exceeds [`MAX_WAIT`].
pub(crate) fn retry_delay(reset: Option<u64>, now: u64, attempt: u32, backoff: Duration) -> Duration {
    let base = reset.map(|reset| wait_duration(reset, now)).unwrap_or_default();
    let factor = 2u32.saturating_pow(attempt).saturating_sub(1);

    base.saturating_add(backoff.saturating_mul(factor)).min(MAX_WAIT)
}

/// The delay before transport retry number `retry` (one-based) of a
/// request answered with a 429 or 5xx: `factor * 2^(retry - 1)`, capped
/// at [`MAX_WAIT`].
pub(crate) fn backoff_delay(retry: u32, factor: Duration) -> Duration {
    factor
        .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
        .min(MAX_WAIT)
}

/// The coarse health of a rate-limit bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RateLimitHealth {
    Healthy,
    Warning,
    Critical,
}

impl RateLimitHealth {
    /// Critical under 10% remaining, warning under 30%.
    fn assess(remaining: u64, limit: u64) -> Self {
        // Compare in integer tenths to avoid float rounding at the boundaries.
        if remaining * 10 < limit {
            Self::Critical
        } else if remaining * 10 < limit * 3 {
            Self::Warning
        } else {
            Self::Healthy
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct CoreStatus {
    pub(crate) limit: u64,
    pub(crate) remaining: u64,
    pub(crate) used: u64,
    pub(crate) usage_percent: f64,
    pub(crate) reset: u64,
    /// Negative once the reset time has passed.
    pub(crate) seconds_until_reset: i64,
    pub(crate) status: RateLimitHealth,
}

/// A snapshot of the token's rate-limit health, built from `GET /rate_limit`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct RateLimitStatus {
    pub(crate) core: CoreStatus,
    pub(crate) search: Option<RateLimitResource>,
    pub(crate) graphql: Option<RateLimitResource>,
    pub(crate) recommendations: Vec<String>,
}

impl RateLimitStatus {
    pub(crate) fn from_overview(overview: &RateLimitOverview, now: u64) -> Self {
        let core = &overview.resources.core;
        let limit = core.limit;
        let remaining = core.remaining;
        let used = limit.saturating_sub(remaining);
        let usage_percent = if limit > 0 {
            ((used as f64 / limit as f64) * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        let seconds_until_reset = core.reset as i64 - now as i64;
        let status = RateLimitHealth::assess(remaining, limit);

        Self {
            core: CoreStatus {
                limit,
                remaining,
                used,
                usage_percent,
                reset: core.reset,
                seconds_until_reset,
                status,
            },
            search: overview.resources.search,
            graphql: overview.resources.graphql,
            recommendations: recommendations(status, remaining, limit, usage_percent, seconds_until_reset),
        }
    }
}

fn recommendations(
    status: RateLimitHealth,
    remaining: u64,
    limit: u64,
    usage_percent: f64,
    seconds_until_reset: i64,
) -> Vec<String> {
    let mut recommendations = vec![];

    match status {
        RateLimitHealth::Critical => {
            recommendations.push(
                "CRITICAL: Rate limit nearly exhausted. Consider pausing operations or using caching."
                    .into(),
            );
            if seconds_until_reset > 0 {
                recommendations.push(format!(
                    "Rate limit resets in {minutes} minutes.",
                    minutes = seconds_until_reset / 60
                ));
            }
        }
        RateLimitHealth::Warning => recommendations.push(
            "WARNING: Rate limit usage is high. Consider implementing request throttling.".into(),
        ),
        RateLimitHealth::Healthy => {}
    }

    if usage_percent > 80.0 {
        recommendations.push(
            "High rate limit usage detected. Review API call patterns and implement caching where possible."
                .into(),
        );
    }

    if seconds_until_reset < 300 && remaining * 2 < limit {
        recommendations.push(
            "Rate limit will reset soon. Consider waiting before making additional requests.".into(),
        );
    }

    if recommendations.is_empty() {
        recommendations.push("Rate limit status is healthy. Continue normal operations.".into());
    }

    recommendations
}
