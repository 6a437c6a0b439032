//! Helper routines.

/// The `User-Agent` sent with every GitHub API request.
pub(crate) static VALIDATOR_AGENT: &str = concat!("github-validator/", env!("CARGO_PKG_VERSION"));

pub(crate) trait PipeSelf<F> {
    fn pipe(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
        Self: Sized,
    {
        f(self)
    }
}

impl<T, F> PipeSelf<F> for T where T: Sized {}

/// Splits a comma-separated header value (such as `X-OAuth-Scopes`) into
/// its trimmed, non-empty items.
pub(crate) fn split_header_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
