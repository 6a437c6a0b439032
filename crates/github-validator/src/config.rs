use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

use crate::{App, probe::Scope};

const CONFIG_CANDIDATES: &[&str] = &[
    ".github/github-validator.yml",
    ".github/github-validator.yaml",
    "github-validator.yml",
    "github-validator.yaml",
    ".github-validator.yml",
];

#[derive(Error, Debug)]
#[error("configuration error in {path}")]
pub(crate) struct ConfigError {
    /// The path to the configuration file that caused this error.
    path: String,
    /// The source of this error.
    pub(crate) source: ConfigErrorInner,
}

#[derive(Error, Debug)]
pub(crate) enum ConfigErrorInner {
    /// An I/O error occurred while loading the configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The overall configuration file is syntactically invalid.
    #[error("invalid configuration syntax")]
    Syntax(#[source] serde_yaml::Error),

    /// `probes.disable` names a probe that doesn't exist.
    #[error("unknown probe `{0}` in `probes.disable`")]
    UnknownProbe(String),

    /// A value is syntactically valid but out of range.
    #[error("invalid value: {0}")]
    Invalid(&'static str),
}

/// HTTP behavior of the GitHub API client.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct ClientConfig {
    /// Per-request timeout, in seconds.
    pub(crate) timeout: u64,
    /// Transport-level retries on 429 and 5xx responses.
    pub(crate) max_retries: u32,
    /// Backoff factor for transport retries, in milliseconds. Retry `n`
    /// waits `retry-backoff-ms * 2^(n - 1)`.
    pub(crate) retry_backoff_ms: u64,
    /// Retries of a request that hit an exhausted rate limit.
    pub(crate) rate_limit_retries: u32,
    /// Base of the exponential backoff added after the first rate-limit wait,
    /// in seconds.
    pub(crate) rate_limit_backoff: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            max_retries: 3,
            retry_backoff_ms: 1000,
            rate_limit_retries: 3,
            rate_limit_backoff: 1,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct CacheConfig {
    pub(crate) enabled: bool,
    /// TTL for single-resource GETs, in seconds.
    pub(crate) ttl: u64,
    /// TTL for GETs carrying a `per_page` parameter, in seconds.
    pub(crate) paginated_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: 300,
            paginated_ttl: 60,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct ProbeConfig {
    /// Probe names to skip entirely.
    pub(crate) disable: Vec<String>,
    /// How many repositories the per-repository probes sample.
    pub(crate) repo_sample: usize,
    /// How many organizations the per-organization probes sample.
    pub(crate) org_sample: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            disable: vec![],
            repo_sample: 5,
            org_sample: 3,
        }
    }
}

/// Data model for github-validator's configuration file.
///
/// Every section is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    client: ClientConfig,
    cache: CacheConfig,
    probes: ProbeConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Config {
    pub(crate) client: ClientConfig,
    pub(crate) cache: CacheConfig,
    pub(crate) probes: ProbeConfig,
}

impl Config {
    /// Loads a [`Config`] from the given contents.
    fn load(contents: &str) -> Result<Self, ConfigErrorInner> {
        // An empty (or comment-only) document deserializes as `None`.
        let raw = serde_yaml::from_str::<Option<RawConfig>>(contents)
            .map_err(ConfigErrorInner::Syntax)?
            .unwrap_or_default();

        if raw.client.timeout == 0 {
            return Err(ConfigErrorInner::Invalid("`client.timeout` must be at least 1"));
        }
        if raw.probes.repo_sample == 0 {
            return Err(ConfigErrorInner::Invalid("`probes.repo-sample` must be at least 1"));
        }
        if raw.probes.org_sample == 0 {
            return Err(ConfigErrorInner::Invalid("`probes.org-sample` must be at least 1"));
        }

        if let Some(unknown) = raw
            .probes
            .disable
            .iter()
            .find(|ident| Scope::from_ident(ident).is_none())
        {
            return Err(ConfigErrorInner::UnknownProbe(unknown.clone()));
        }

        Ok(Self {
            client: raw.client,
            cache: raw.cache,
            probes: raw.probes,
        })
    }

    fn load_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        tracing::debug!("loading config from `{path}`");

        fs::read_to_string(path)
            .map_err(ConfigErrorInner::from)
            .and_then(|contents| Self::load(&contents))
            .map_err(|err| ConfigError {
                path: path.to_string(),
                source: err,
            })
    }

    /// Discover a [`Config`] starting in the given directory.
    ///
    /// Each directory is checked for the [`CONFIG_CANDIDATES`] in order;
    /// the search then continues in the parent directory, terminating at
    /// the filesystem root or at the first directory containing `.git`.
    fn discover_in_dir(path: &Utf8Path) -> Result<Option<Self>, ConfigError> {
        tracing::debug!("attempting config discovery in `{path}`");

        let canonical = path.canonicalize_utf8().map_err(|err| ConfigError {
            path: path.to_string(),
            source: err.into(),
        })?;
        let mut candidate_dir = canonical.as_path();

        loop {
            for candidate in CONFIG_CANDIDATES {
                let candidate_path = candidate_dir.join(candidate);
                if candidate_path.is_file() {
                    tracing::debug!("found config candidate at `{candidate_path}`");
                    return Self::load_file(&candidate_path).map(Some);
                }
            }

            if candidate_dir.join(".git").is_dir() {
                tracing::debug!("found `{candidate_dir}/.git`, stopping search");
                return Ok(None);
            }

            let Some(parent) = candidate_dir.parent() else {
                tracing::debug!("reached filesystem root without finding a config");
                return Ok(None);
            };

            candidate_dir = parent;
        }
    }

    /// Loads the [`Config`] for the given [`App`].
    ///
    /// Precedence:
    /// 1. `--no-config` disables all config loading.
    /// 2. `--config <file>` loads exactly that file.
    /// 3. Otherwise, a config is discovered from the working directory.
    ///
    /// `--no-cache` is applied on top of whichever config was loaded.
    pub(crate) fn new(app: &App) -> Result<Self, ConfigError> {
        let mut config = if app.no_config {
            tracing::debug!("skipping config discovery: explicitly disabled");
            Self::default()
        } else if let Some(path) = &app.config {
            Self::load_file(path)?
        } else {
            match std::env::current_dir()
                .ok()
                .and_then(|cwd| Utf8PathBuf::from_path_buf(cwd).ok())
            {
                Some(cwd) => Self::discover_in_dir(&cwd)?.unwrap_or_default(),
                None => {
                    tracing::debug!("working directory unavailable or not UTF-8, skipping discovery");
                    Self::default()
                }
            }
        };

        if app.no_cache {
            config.cache.enabled = false;
        }

        Ok(config)
    }

    /// Returns `true` if this [`Config`] disables the given probe.
    pub(crate) fn disables(&self, ident: &str) -> bool {
        self.probes.disable.iter().any(|disabled| disabled == ident)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{CacheConfig, ClientConfig, Config, ConfigErrorInner, ProbeConfig};

    #[test]
    fn test_load_defaults() -> anyhow::Result<()> {
        assert_eq!(Config::load("")?, Config::default());
        assert_eq!(Config::load("# nothing here\n")?, Config::default());
        assert_eq!(Config::load("client: {}\n")?, Config::default());

        Ok(())
    }

    #[test]
    fn test_load_full() -> anyhow::Result<()> {
        let config = Config::load(
            r#"
client:
  timeout: 10
  max-retries: 5
  retry-backoff-ms: 250
  rate-limit-retries: 1
  rate-limit-backoff: 2
cache:
  enabled: false
  ttl: 600
  paginated-ttl: 30
probes:
  disable: ["admin:enterprise", "read:audit_log"]
  repo-sample: 2
  org-sample: 1
"#,
        )?;

        assert_eq!(
            config,
            Config {
                client: ClientConfig {
                    timeout: 10,
                    max_retries: 5,
                    retry_backoff_ms: 250,
                    rate_limit_retries: 1,
                    rate_limit_backoff: 2,
                },
                cache: CacheConfig {
                    enabled: false,
                    ttl: 600,
                    paginated_ttl: 30,
                },
                probes: ProbeConfig {
                    disable: vec!["admin:enterprise".into(), "read:audit_log".into()],
                    repo_sample: 2,
                    org_sample: 1,
                },
            }
        );
        assert!(config.disables("admin:enterprise"));
        assert!(!config.disables("repo"));

        Ok(())
    }

    #[test]
    fn test_load_partial_section() -> anyhow::Result<()> {
        let config = Config::load("cache:\n  ttl: 10\n")?;

        assert_eq!(config.cache.ttl, 10);
        assert_eq!(config.cache.paginated_ttl, 60);
        assert!(config.cache.enabled);
        assert_eq!(config.client, ClientConfig::default());

        Ok(())
    }

    #[test]
    fn test_load_errors() {
        for (contents, check) in [
            ("clients: {}\n", "syntax"),
            ("client:\n  retries: 1\n", "syntax"),
            ("client: [\n", "syntax"),
            ("probes:\n  disable: [\"repo\", \"nope\"]\n", "unknown"),
            ("client:\n  timeout: 0\n", "invalid"),
            ("probes:\n  repo-sample: 0\n", "invalid"),
        ] {
            let err = Config::load(contents).unwrap_err();
            match (check, err) {
                ("syntax", ConfigErrorInner::Syntax(_)) => {}
                ("unknown", ConfigErrorInner::UnknownProbe(ident)) => assert_eq!(ident, "nope"),
                ("invalid", ConfigErrorInner::Invalid(_)) => {}
                (check, err) => panic!("expected {check} error for {contents:?}, got {err}"),
            }
        }
    }
}
