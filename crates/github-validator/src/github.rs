//! GitHub API client and related types.
//!
//! The [`Client`] wraps GitHub's REST API with a read-through response
//! cache, rate-limit tracking with bounded retries, page-numbered
//! pagination, and error classification.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use github_rest_models::{rate_limit::RateLimitOverview, users::User};
use reqwest::{
    Method, Response, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, InvalidHeaderValue},
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::{
    cache::{CacheStats, Params, ResponseCache},
    config::{CacheConfig, ClientConfig, Config},
    errors::{ErrorLog, ErrorSummary},
    utils::{PipeSelf, VALIDATOR_AGENT},
};

pub(crate) mod ratelimit;

use ratelimit::{RateLimitState, backoff_delay, now_epoch, retry_delay};

/// The page size used for every paginated listing.
pub(crate) const PER_PAGE: usize = 100;

/// Statuses retried with exponential backoff before any other handling.
const RETRY_STATUSES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Represents different types of GitHub hosts.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum GitHubHost {
    Enterprise(String),
    Standard(String),
}

impl GitHubHost {
    pub(crate) fn new(hostname: &str) -> anyhow::Result<Self, String> {
        let normalized = hostname.to_lowercase();

        // Catch the most likely confusion: a URL where a bare domain belongs.
        // Explicit API base URLs go through `--base-url` instead.
        if normalized.starts_with("https://") || normalized.starts_with("http://") {
            return Err("must be a domain name, not a URL (use --base-url for URLs)".into());
        }

        if normalized.eq_ignore_ascii_case("github.com") || normalized.ends_with(".ghe.com") {
            Ok(Self::Standard(hostname.into()))
        } else {
            Ok(Self::Enterprise(hostname.into()))
        }
    }

    fn to_api_host(&self) -> String {
        match self {
            Self::Enterprise(host) => host.clone(),
            Self::Standard(host) => format!("api.{host}"),
        }
    }

    pub(crate) fn to_api_url(&self) -> String {
        match self {
            Self::Enterprise(_) => format!("https://{host}/api/v3", host = self.to_api_host()),
            Self::Standard(_) => format!("https://{host}", host = self.to_api_host()),
        }
    }
}

impl Default for GitHubHost {
    fn default() -> Self {
        Self::Standard("github.com".into())
    }
}

impl Display for GitHubHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enterprise(host) => write!(f, "{host}"),
            Self::Standard(host) => write!(f, "{host}"),
        }
    }
}

impl FromStr for GitHubHost {
    type Err = String;

    fn from_str(s: &str) -> anyhow::Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A sanitized GitHub access token.
#[derive(Clone)]
pub(crate) struct GitHubToken(String);

impl GitHubToken {
    pub(crate) fn new(token: &str) -> anyhow::Result<Self, String> {
        let token = token.trim();
        if token.is_empty() {
            return Err("GitHub token cannot be empty".into());
        }
        Ok(Self(token.to_owned()))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Errors that can occur while using the GitHub API client.
#[derive(Debug, Error)]
pub(crate) enum ClientError {
    /// An error originating from the underlying HTTP client.
    #[error("request error while accessing GitHub API")]
    Request(#[source] reqwest::Error),
    /// An error originating from the HTTP client's middleware.
    #[error("request error while accessing GitHub API")]
    Middleware(#[source] reqwest_middleware::Error),
    /// We couldn't turn the user's token into a valid header value.
    #[error("invalid token header")]
    InvalidTokenHeader(#[from] InvalidHeaderValue),
    /// The API base URL isn't a usable URL.
    #[error("invalid API base URL: {url}")]
    InvalidBaseUrl { url: String },
    /// GitHub answered with a non-success status.
    #[error("{method} {endpoint} failed: {status}{}", detail(.message))]
    Status {
        method: Method,
        endpoint: String,
        status: StatusCode,
        message: String,
    },
    /// A request kept hitting an exhausted rate limit.
    #[error("rate limit still exhausted after {attempts} attempts")]
    RateLimitExhausted { attempts: u32, reset: Option<u64> },
    /// A response body wasn't the JSON we expected.
    #[error("couldn't decode GitHub API response")]
    Decode(#[from] serde_json::Error),
    /// Any of the errors above, after being recorded and classified.
    #[error("{user_message}")]
    Classified {
        user_message: String,
        #[source]
        source: Box<ClientError>,
    },
}

fn detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err)
    }
}

impl From<reqwest_middleware::Error> for ClientError {
    fn from(err: reqwest_middleware::Error) -> Self {
        // Unwrap plain transport errors so that their status and
        // kind stay visible to callers and the error classifier.
        match err {
            reqwest_middleware::Error::Reqwest(err) => Self::Request(err),
            err => Self::Middleware(err),
        }
    }
}

impl ClientError {
    /// The HTTP status behind this error, if there was one.
    pub(crate) fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(err) => err.status(),
            Self::Classified { source, .. } => source.status(),
            _ => None,
        }
    }

    pub(crate) fn is_forbidden(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN)
    }

    pub(crate) fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// The `message` field GitHub puts in error response bodies.
#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// A decoded response along with its headers.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub(crate) headers: HeaderMap,
    pub(crate) body: Value,
}

struct RequestLoggingMiddleware;

#[async_trait::async_trait]
impl reqwest_middleware::Middleware for RequestLoggingMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut http::Extensions,
        next: reqwest_middleware::Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().clone();
        let url = req.url().clone();
        tracing::debug!("{method} {url}");

        let res = next.run(req, extensions).await?;

        tracing::debug!(
            "{method} {url} -> {status} (rate limit remaining: {remaining})",
            status = res.status(),
            remaining = res
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown"),
        );

        Ok(res)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Client {
    api_base: String,
    api_client: ClientWithMiddleware,
    settings: ClientConfig,
    cache_settings: CacheConfig,
    cache: Option<Mutex<ResponseCache>>,
    errors: Mutex<ErrorLog>,
    rate_limit: Mutex<RateLimitState>,
}

impl Client {
    pub(crate) fn new(
        api_base: &str,
        token: &GitHubToken,
        config: &Config,
    ) -> Result<Self, ClientError> {
        let api_base = api_base.trim_end_matches('/').to_string();
        if !Url::parse(&api_base).is_ok_and(|url| url.host_str().is_some()) {
            return Err(ClientError::InvalidBaseUrl { url: api_base });
        }

        let mut api_client_headers = HeaderMap::new();
        api_client_headers.insert(AUTHORIZATION, token.to_header_value()?);
        api_client_headers.insert("X-GitHub-Api-Version", "2022-11-28".parse()?);
        api_client_headers.insert(ACCEPT, "application/vnd.github.v3+json".parse()?);

        let client = reqwest::Client::builder()
            .user_agent(VALIDATOR_AGENT)
            .default_headers(api_client_headers)
            .timeout(Duration::from_secs(config.client.timeout))
            .build()?;

        let cache = config.cache.enabled.then(|| {
            Mutex::new(ResponseCache::new(Duration::from_secs(config.cache.ttl)))
        });

        Ok(Self {
            api_base,
            api_client: ClientBuilder::new(client)
                .with(RequestLoggingMiddleware)
                .build(),
            settings: config.client.clone(),
            cache_settings: config.cache.clone(),
            cache,
            errors: Mutex::new(ErrorLog::default()),
            rate_limit: Mutex::new(RateLimitState::default()),
        })
    }

    /// Issues a single request, transparently retrying transient failures
    /// (429 and 5xx, with exponential backoff) and waiting out an exhausted
    /// rate limit, each up to its configured number of times.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: &Params,
        body: Option<&Value>,
    ) -> Result<Response, ClientError> {
        let url = format!("{api_base}{endpoint}", api_base = self.api_base);
        let mut attempt = 0;
        let mut transient_retries = 0;

        loop {
            let resp = self
                .api_client
                .request(method.clone(), &url)
                .pipe(|req| if params.is_empty() { req } else { req.query(params) })
                .pipe(|req| match body {
                    Some(body) => req.json(body),
                    None => req,
                })
                .send()
                .await?;

            let state = {
                let mut state = lock(&self.rate_limit);
                state.observe(resp.headers());
                *state
            };

            if RETRY_STATUSES.contains(&resp.status())
                && transient_retries < self.settings.max_retries
            {
                transient_retries += 1;
                let delay = backoff_delay(
                    transient_retries,
                    Duration::from_millis(self.settings.retry_backoff_ms),
                );
                tracing::debug!(
                    "{method} {endpoint} answered {status}, retry {transient_retries}/{max} in {ms}ms",
                    status = resp.status(),
                    max = self.settings.max_retries,
                    ms = delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if resp.status() != StatusCode::FORBIDDEN || !state.is_exhausted() {
                return Ok(resp);
            }

            if attempt >= self.settings.rate_limit_retries {
                return Err(ClientError::RateLimitExhausted {
                    attempts: attempt + 1,
                    reset: state.reset,
                });
            }

            let delay = retry_delay(
                state.reset,
                now_epoch(),
                attempt,
                Duration::from_secs(self.settings.rate_limit_backoff),
            );
            tracing::warn!(
                "rate limit exhausted on {method} {endpoint}, retrying in {secs}s",
                secs = delay.as_secs()
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            attempt += 1;
        }
    }

    /// Turns a non-success response into [`ClientError::Status`].
    async fn ensure_success(
        method: Method,
        endpoint: &str,
        resp: Response,
    ) -> Result<Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = resp
            .json::<ApiErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_default();

        Err(ClientError::Status {
            method,
            endpoint: endpoint.into(),
            status,
            message,
        })
    }

    /// Decodes a response body as JSON. An empty body decodes to `null`.
    async fn json_body(resp: Response) -> Result<Value, ClientError> {
        let text = resp.text().await?;
        if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }

    /// Records `err` in the error log and wraps it with its
    /// user-facing message.
    fn classify(&self, err: ClientError, context: &str) -> ClientError {
        let user_message = lock(&self.errors)
            .record(&err, Some(context))
            .user_message
            .clone();

        ClientError::Classified {
            user_message,
            source: Box::new(err),
        }
    }

    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Option<Value>, ClientError> {
        let resp = self.send(Method::GET, endpoint, params, None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resp = Self::ensure_success(Method::GET, endpoint, resp).await?;
        Self::json_body(resp).await.map(Some)
    }

    /// Fetch a single resource, consulting the response cache first.
    ///
    /// Returns `None` if the request produces a 404.
    pub(crate) async fn get(&self, endpoint: &str) -> Result<Option<Value>, ClientError> {
        self.get_with(endpoint, &Params::new(), true).await
    }

    #[instrument(skip(self, params))]
    pub(crate) async fn get_with(
        &self,
        endpoint: &str,
        params: &Params,
        use_cache: bool,
    ) -> Result<Option<Value>, ClientError> {
        let cache = self.cache.as_ref().filter(|_| use_cache);

        if let Some(cache) = cache
            && let Some(value) = lock(cache).get(endpoint, params)
        {
            return Ok(Some(value));
        }

        match self.fetch(endpoint, params).await {
            Ok(value) => {
                if let Some(cache) = cache
                    && let Some(value) = value.as_ref().filter(|v| !v.is_null())
                {
                    // Listing calls go stale faster than single resources.
                    let ttl = if params.contains_key("per_page") {
                        self.cache_settings.paginated_ttl
                    } else {
                        self.cache_settings.ttl
                    };
                    lock(cache).set(endpoint, params, value.clone(), Some(Duration::from_secs(ttl)));
                }
                Ok(value)
            }
            Err(err) => Err(self.classify(err, &format!("GET {endpoint}"))),
        }
    }

    /// Like [`Client::get`], but decodes the resource as `T`.
    pub(crate) async fn get_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Option<T>, ClientError> {
        match self.get(endpoint).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn fetch_raw(&self, endpoint: &str) -> Result<Option<RawResponse>, ClientError> {
        let resp = self.send(Method::GET, endpoint, &Params::new(), None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resp = Self::ensure_success(Method::GET, endpoint, resp).await?;
        let headers = resp.headers().clone();
        let body = Self::json_body(resp).await?;

        Ok(Some(RawResponse { headers, body }))
    }

    /// Fetch a single resource along with its response headers,
    /// bypassing the cache.
    #[instrument(skip(self))]
    pub(crate) async fn get_raw(&self, endpoint: &str) -> Result<Option<RawResponse>, ClientError> {
        self.fetch_raw(endpoint)
            .await
            .map_err(|err| self.classify(err, &format!("GET {endpoint}")))
    }

    // Writes bypass the response cache.

    #[instrument(skip(self, body))]
    pub(crate) async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, ClientError> {
        let resp = self
            .send(Method::POST, endpoint, &Params::new(), Some(body))
            .await?;
        let resp = Self::ensure_success(Method::POST, endpoint, resp).await?;
        Self::json_body(resp).await
    }

    #[instrument(skip(self, body))]
    pub(crate) async fn put(&self, endpoint: &str, body: &Value) -> Result<Value, ClientError> {
        let resp = self
            .send(Method::PUT, endpoint, &Params::new(), Some(body))
            .await?;
        let resp = Self::ensure_success(Method::PUT, endpoint, resp).await?;
        Self::json_body(resp).await
    }

    /// Returns `true` iff GitHub answers with exactly `204 No Content`.
    #[instrument(skip(self))]
    pub(crate) async fn delete(&self, endpoint: &str) -> Result<bool, ClientError> {
        let resp = self
            .send(Method::DELETE, endpoint, &Params::new(), None)
            .await?;
        Ok(resp.status() == StatusCode::NO_CONTENT)
    }

    async fn paginate_inner(
        &self,
        endpoint: &str,
        params: &Params,
        field: Option<&str>,
        max_pages: Option<usize>,
    ) -> Result<Option<Vec<Value>>, ClientError> {
        let mut params = params.clone();
        params.insert("per_page".into(), PER_PAGE.to_string());

        let mut items = vec![];
        let mut page = 1;

        loop {
            params.insert("page".into(), page.to_string());

            let resp = self.send(Method::GET, endpoint, &params, None).await?;
            if resp.status() == StatusCode::NOT_FOUND {
                if page == 1 {
                    return Ok(None);
                }
                break;
            }

            let resp = Self::ensure_success(Method::GET, endpoint, resp).await?;
            let batch = match (Self::json_body(resp).await?, field) {
                (Value::Array(batch), None) => batch,
                (Value::Object(mut wrapper), Some(field)) => match wrapper.remove(field) {
                    Some(Value::Array(batch)) => batch,
                    _ => break,
                },
                _ => break,
            };

            if batch.is_empty() {
                break;
            }

            let len = batch.len();
            items.extend(batch);

            if len < PER_PAGE || max_pages.is_some_and(|max| page >= max) {
                break;
            }

            page += 1;
        }

        tracing::debug!("{endpoint}: {count} items over {page} pages", count = items.len());

        Ok(Some(items))
    }

    /// Walks a page-numbered listing, 100 items per page, until a short
    /// or empty page, a non-list response, a 404, or `max_pages`.
    ///
    /// Listings that wrap their items in an object (`{"total_count": .., "runners": [..]}`)
    /// name the wrapping key in `field`.
    ///
    /// Returns `None` iff the very first page is a 404, i.e. the listing
    /// doesn't exist or isn't visible to the token. Pagination never
    /// consults the response cache.
    #[instrument(skip(self, params))]
    pub(crate) async fn paginate(
        &self,
        endpoint: &str,
        params: &Params,
        field: Option<&str>,
        max_pages: Option<usize>,
    ) -> Result<Option<Vec<Value>>, ClientError> {
        self.paginate_inner(endpoint, params, field, max_pages)
            .await
            .map_err(|err| self.classify(err, &format!("GET {endpoint}")))
    }

    /// Every item of a page-numbered listing; a missing listing is empty.
    pub(crate) async fn get_paginated(
        &self,
        endpoint: &str,
        params: &Params,
    ) -> Result<Vec<Value>, ClientError> {
        Ok(self
            .paginate(endpoint, params, None, None)
            .await?
            .unwrap_or_default())
    }

    /// Like [`Client::paginate`], but decodes each item as `T`.
    pub(crate) async fn list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        field: Option<&str>,
        max_pages: Option<usize>,
    ) -> Result<Option<Vec<T>>, ClientError> {
        match self
            .paginate(endpoint, &Params::new(), field, max_pages)
            .await?
        {
            Some(items) => Ok(Some(serde_json::from_value(Value::Array(items))?)),
            None => Ok(None),
        }
    }

    /// Checks the token by fetching the authenticated user.
    ///
    /// Returns `None` iff GitHub rejects the token with a 401.
    #[instrument(skip(self))]
    pub(crate) async fn test_authentication(&self) -> Result<Option<User>, ClientError> {
        match self.get_as::<User>("/user").await {
            Ok(user) => Ok(user),
            Err(err) if err.is_unauthorized() => {
                tracing::debug!("authentication rejected: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// The token's current rate-limit overview. Never cached.
    #[instrument(skip(self))]
    pub(crate) async fn rate_limit_info(&self) -> Result<Option<RateLimitOverview>, ClientError> {
        match self.get_with("/rate_limit", &Params::new(), false).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| {
            let mut cache = lock(cache);
            cache.cleanup_expired();
            cache.stats()
        })
    }

    pub(crate) fn error_summary(&self) -> ErrorSummary {
        lock(&self.errors).summary()
    }

    /// The rate-limit figures from the most recent response.
    pub(crate) fn rate_limit_state(&self) -> RateLimitState {
        *lock(&self.rate_limit)
    }
}
