//! Failure classification and the per-run error log.
//!
//! Every failure that reaches the API client's boundary is mapped onto a
//! small, fixed taxonomy, given a user-facing message and a handful of
//! remediation suggestions, and recorded for the end-of-run summary.

use std::{error::Error, fmt::Display, io};

use indexmap::IndexMap;
use serde::Serialize;

/// The fixed failure taxonomy.
///
/// Variant order is significant: classification tries categories in
/// declaration order and the first keyword match wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ErrorCategory {
    Authentication,
    RateLimit,
    NotFound,
    Permission,
    Network,
    ApiError,
    Validation,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    /// Every keyword-matched category, in match order.
    const ORDERED: &[ErrorCategory] = &[
        Self::Authentication,
        Self::RateLimit,
        Self::NotFound,
        Self::Permission,
        Self::Network,
        Self::ApiError,
        Self::Validation,
        Self::Timeout,
    ];

    /// Keywords matched case-insensitively against an error's full message.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Authentication => &["401", "403", "unauthorized", "forbidden", "bad credentials"],
            Self::RateLimit => &["429", "rate limit", "x-ratelimit"],
            Self::NotFound => &["404", "not found"],
            Self::Permission => &["403", "forbidden", "permission", "access denied"],
            Self::Network => &["connection", "timeout", "dns", "network"],
            Self::ApiError => &["500", "502", "503", "504", "internal server error"],
            Self::Validation => &["400", "bad request", "validation", "invalid"],
            Self::Timeout => &["timeout", "timed out"],
            Self::Unknown => &[],
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::RateLimit => "rate_limit",
            Self::NotFound => "not_found",
            Self::Permission => "permission",
            Self::Network => "network",
            Self::ApiError => "api_error",
            Self::Validation => "validation",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    pub(crate) fn user_message(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication failed. Please check your API key/token.",
            Self::RateLimit => "Rate limit exceeded. Please wait before making more requests.",
            Self::NotFound => {
                "Resource not found. The requested resource may not exist or you may not have access."
            }
            Self::Permission => {
                "Permission denied. Your API key may not have the required permissions."
            }
            Self::Network => "Network error occurred. Please check your internet connection.",
            Self::ApiError => "GitHub API error. The service may be temporarily unavailable.",
            Self::Validation => "Invalid input or request format.",
            Self::Timeout => "Request timed out. The operation took too long to complete.",
            Self::Unknown => "An unexpected error occurred.",
        }
    }

    pub(crate) fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Self::Authentication => &[
                "Verify your API key is correct and not expired",
                "Check that the token has the required scopes",
                "Ensure you're using the correct base URL for GitHub Enterprise",
            ],
            Self::RateLimit => &[
                "Wait for the rate limit to reset",
                "Use a token with higher rate limits",
                "Implement exponential backoff in your requests",
            ],
            Self::NotFound => &[
                "Verify the resource name is correct",
                "Check if you have access to the resource",
                "Ensure the resource exists",
            ],
            Self::Permission => &[
                "Review the token's permissions",
                "Request additional scopes if needed",
                "Check organization or enterprise policies",
            ],
            Self::Network => &[
                "Check your internet connection",
                "Verify the API endpoint is accessible",
                "Check firewall or proxy settings",
            ],
            Self::ApiError => &[
                "Retry the request after a short delay",
                "Check GitHub status page for service issues",
                "Verify the request format is correct",
            ],
            Self::Timeout => &[
                "Increase the timeout value",
                "Check your network connectivity",
                "Try reducing the amount of data requested",
            ],
            Self::Validation | Self::Unknown => &["Review the error details and try again"],
        }
    }

    /// Classifies an error by keyword, falling back to the concrete types
    /// in its source chain, and finally to [`ErrorCategory::Unknown`].
    pub(crate) fn categorize(error: &(dyn Error + 'static)) -> Self {
        let message = render_chain(error).to_lowercase();

        Self::ORDERED
            .iter()
            .copied()
            .find(|category| category.keywords().iter().any(|kw| message.contains(kw)))
            .unwrap_or_else(|| Self::from_source_types(error))
    }

    fn from_source_types(error: &(dyn Error + 'static)) -> Self {
        let mut current = Some(error);

        while let Some(err) = current {
            if let Some(err) = err.downcast_ref::<reqwest::Error>() {
                return if err.is_timeout() {
                    Self::Timeout
                } else if err.is_decode() {
                    Self::Validation
                } else {
                    Self::Network
                };
            }

            if err.is::<serde_json::Error>() {
                return Self::Validation;
            }

            if let Some(err) = err.downcast_ref::<io::Error>() {
                return match err.kind() {
                    io::ErrorKind::TimedOut => Self::Timeout,
                    io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => Self::Validation,
                    _ => Self::Network,
                };
            }

            current = err.source();
        }

        Self::Unknown
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders an error and all of its sources as a single `: `-separated line.
pub(crate) fn render_chain(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();

    while let Some(err) = current {
        let next = err.to_string();
        // Transparent wrappers repeat their source's message verbatim.
        if !rendered.ends_with(&next) {
            rendered.push_str(": ");
            rendered.push_str(&next);
        }
        current = err.source();
    }

    rendered
}

/// A single classified failure.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ErrorRecord {
    pub(crate) category: ErrorCategory,
    /// The concrete error type, without its module path.
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) message: String,
    pub(crate) user_message: String,
    pub(crate) context: Option<String>,
    pub(crate) suggestions: Vec<&'static str>,
    /// Each error in the source chain, outermost first.
    pub(crate) source_chain: Vec<String>,
}

impl ErrorRecord {
    pub(crate) fn new<E>(error: &E, context: Option<&str>) -> Self
    where
        E: Error + 'static,
    {
        let category = ErrorCategory::categorize(error);

        let mut user_message = category.user_message().to_string();
        if let Some(context) = context {
            user_message.push_str(&format!(" (Context: {context})"));
        }

        let mut source_chain = vec![];
        let mut current: Option<&(dyn Error + 'static)> = Some(error);
        while let Some(err) = current {
            source_chain.push(err.to_string());
            current = err.source();
        }

        Self {
            category,
            kind: short_type_name::<E>(),
            message: render_chain(error),
            user_message,
            context: context.map(Into::into),
            suggestions: category.suggestions().to_vec(),
            source_chain,
        }
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let name = std::any::type_name::<T>();
    // Strip generics before splitting on the path separator.
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorSummary {
    pub(crate) total_errors: usize,
    pub(crate) error_counts: IndexMap<ErrorCategory, usize>,
    pub(crate) errors_by_category: IndexMap<ErrorCategory, Vec<ErrorRecord>>,
}

/// Every failure classified during a run, in the order they occurred.
#[derive(Debug, Default)]
pub(crate) struct ErrorLog {
    records: Vec<ErrorRecord>,
    counts: IndexMap<ErrorCategory, usize>,
}

impl ErrorLog {
    /// Classifies `error`, appends the result to the log and returns it.
    pub(crate) fn record<E>(&mut self, error: &E, context: Option<&str>) -> &ErrorRecord
    where
        E: Error + 'static,
    {
        let record = ErrorRecord::new(error, context);
        tracing::debug!(
            "classified error as {category}: {message}",
            category = record.category,
            message = record.message
        );

        *self.counts.entry(record.category).or_default() += 1;
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn summary(&self) -> ErrorSummary {
        let mut errors_by_category: IndexMap<ErrorCategory, Vec<ErrorRecord>> = IndexMap::new();
        for record in &self.records {
            errors_by_category
                .entry(record.category)
                .or_default()
                .push(record.clone());
        }

        ErrorSummary {
            total_errors: self.records.len(),
            error_counts: self.counts.clone(),
            errors_by_category,
        }
    }
}
