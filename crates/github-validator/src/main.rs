#![warn(clippy::all, clippy::dbg_macro)]

use std::{
    io::{Write, stdout},
    process::ExitCode,
};

use annotate_snippets::{Group, Level, Renderer};
use anstream::{eprintln, stream::IsTerminal};
use anyhow::{Context as _, Result, anyhow};
use camino::Utf8PathBuf;
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::Generator;
use clap_verbosity_flag::InfoLevel;
use config::Config;
use github::{Client, GitHubHost, GitHubToken, ratelimit::RateLimitStatus};
use itertools::Itertools as _;
use owo_colors::OwoColorize;
use probe::Prober;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use crate::token::TokenMetadata;

mod cache;
mod config;
mod errors;
mod github;
mod output;
mod probe;
mod runners;
mod token;
mod utils;

/// Audits which OAuth scopes a GitHub API token effectively holds.
///
/// Every check is read-only unless `--creation-test` is given: scopes
/// that can only be proven by writing are inferred from a weaker signal
/// and marked as "proxy".
#[derive(Parser)]
#[command(about, version)]
pub(crate) struct App {
    /// The GitHub API token to audit.
    #[arg(long, env = "GITHUB_API_KEY", required = true, hide_env_values = true, value_parser = GitHubToken::new)]
    api_key: Option<GitHubToken>,

    /// The organization to aim organization-level probes at.
    ///
    /// Without one, probes sample the organizations the token's user
    /// belongs to.
    #[arg(long, visible_alias = "company", value_name = "ORG")]
    org: Option<String>,

    /// The GitHub Server Hostname. Defaults to github.com
    #[arg(long, env = "GH_HOST", default_value = "github.com")]
    gh_hostname: GitHubHost,

    /// An explicit API base URL, e.g. `https://ghe.example.com/api/v3`.
    ///
    /// Takes precedence over `--gh-hostname`.
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// The enterprise slug used by enterprise runner probes.
    #[arg(long, env = "GITHUB_ENTERPRISE_SLUG", value_name = "SLUG")]
    enterprise_slug: Option<String>,

    /// Probe every known scope. This is the default mode.
    #[arg(long, group = "mode")]
    validate: bool,

    /// Report what GitHub says about the token itself: scopes, type and
    /// App installations.
    #[arg(long, group = "mode")]
    token_info: bool,

    /// Report the token's current rate-limit status.
    #[arg(long, group = "mode")]
    rate_limit: bool,

    /// Also create, tag and delete a private throwaway repository to
    /// prove repository write access.
    ///
    /// This is the only check that writes to the account.
    #[arg(long, conflicts_with_all = ["token_info", "rate_limit"])]
    creation_test: bool,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity<InfoLevel>,

    /// Don't show progress bars, even if the terminal supports them.
    #[arg(long)]
    no_progress: bool,

    /// Don't cache API responses, not even within a single run.
    #[arg(long)]
    no_cache: bool,

    /// The output format to emit.
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Control the use of color in output.
    #[arg(long, value_enum, value_name = "MODE")]
    color: Option<ColorMode>,

    /// The configuration file to load. By default, any config will be
    /// discovered relative to $CWD.
    #[arg(short, long, env = "GITHUB_VALIDATOR_CONFIG", group = "conf")]
    config: Option<Utf8PathBuf>,

    /// Disable all configuration loading.
    #[arg(long, group = "conf")]
    no_config: bool,

    /// Generate tab completion scripts for the specified shell.
    #[arg(long, value_enum, value_name = "SHELL", exclusive = true)]
    completions: Option<Shell>,
}

/// Shell with auto-generated completion script available.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, ValueEnum)]
#[allow(clippy::enum_variant_names)]
enum Shell {
    /// Bourne Again `SHell` (bash)
    Bash,
    /// Elvish shell
    Elvish,
    /// Friendly Interactive `SHell` (fish)
    Fish,
    /// Nushell
    Nushell,
    /// `PowerShell`
    Powershell,
    /// Z `SHell` (zsh)
    Zsh,
}

impl Generator for Shell {
    fn file_name(&self, name: &str) -> String {
        match self {
            Shell::Bash => clap_complete::shells::Bash.file_name(name),
            Shell::Elvish => clap_complete::shells::Elvish.file_name(name),
            Shell::Fish => clap_complete::shells::Fish.file_name(name),
            Shell::Nushell => clap_complete_nushell::Nushell.file_name(name),
            Shell::Powershell => clap_complete::shells::PowerShell.file_name(name),
            Shell::Zsh => clap_complete::shells::Zsh.file_name(name),
        }
    }

    fn generate(&self, cmd: &clap::Command, buf: &mut dyn std::io::Write) {
        match self {
            Shell::Bash => clap_complete::shells::Bash.generate(cmd, buf),
            Shell::Elvish => clap_complete::shells::Elvish.generate(cmd, buf),
            Shell::Fish => clap_complete::shells::Fish.generate(cmd, buf),
            Shell::Nushell => clap_complete_nushell::Nushell.generate(cmd, buf),
            Shell::Powershell => clap_complete::shells::PowerShell.generate(cmd, buf),
            Shell::Zsh => clap_complete::shells::Zsh.generate(cmd, buf),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable output.
    #[default]
    Plain,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub(crate) enum ColorMode {
    /// Use color output if the output supports it.
    Auto,
    /// Force color output, even if the output isn't a terminal.
    Always,
    /// Disable color output, even if the output is a compatible terminal.
    Never,
}

impl ColorMode {
    /// Returns a concrete (i.e. non-auto) `anstream::ColorChoice` for the given terminal.
    ///
    /// Needed for type-erased streams (e.g. `Box<dyn Write>`), where
    /// `anstream` can't detect a terminal on its own.
    fn color_choice_for_terminal(&self, io: impl IsTerminal) -> anstream::ColorChoice {
        match self {
            ColorMode::Auto => {
                if io.is_terminal() {
                    anstream::ColorChoice::Always
                } else {
                    anstream::ColorChoice::Never
                }
            }
            ColorMode::Always => anstream::ColorChoice::Always,
            ColorMode::Never => anstream::ColorChoice::Never,
        }
    }
}

impl From<ColorMode> for anstream::ColorChoice {
    fn from(value: ColorMode) -> Self {
        match value {
            ColorMode::Auto => Self::Auto,
            ColorMode::Always => Self::Always,
            ColorMode::Never => Self::Never,
        }
    }
}

/// Renders an error title followed by `note:` tips.
pub(crate) fn tips(err: impl AsRef<str>, tips: &[impl AsRef<str>]) -> String {
    let group = tips.iter().fold(
        Group::with_title(Level::ERROR.primary_title(err.as_ref())),
        |group, tip| group.element(Level::NOTE.message(tip.as_ref())),
    );

    Renderer::styled().render(&[group])
}

fn completions<G: clap_complete::Generator>(generator: G, cmd: &mut clap::Command) {
    clap_complete::generate(
        generator,
        cmd,
        cmd.get_name().to_string(),
        &mut std::io::stdout(),
    );
}

/// Emits the client's bookkeeping for the run at `debug`.
fn log_client_stats(client: &Client) {
    if let Some(stats) = client.cache_stats() {
        tracing::debug!(
            "cache: {hits} hits, {misses} misses ({hit_rate}% hit rate), {size} entries",
            hits = stats.hits,
            misses = stats.misses,
            hit_rate = stats.hit_rate,
            size = stats.size,
        );
    }

    let errors = client.error_summary();
    if errors.total_errors > 0 {
        tracing::debug!(
            "{total} API errors: {counts}",
            total = errors.total_errors,
            counts = errors
                .error_counts
                .iter()
                .map(|(category, count)| format!("{}={count}", category.as_str()))
                .join(", "),
        );
    }

    let rate = client.rate_limit_state();
    if let (Some(remaining), Some(limit)) = (rate.remaining, rate.limit) {
        tracing::debug!("rate limit after run: {remaining}/{limit} remaining");
    }
}

#[tokio::main]
async fn run() -> Result<ExitCode> {
    human_panic::setup_panic!();

    let mut app = App::parse();

    if let Some(shell) = app.completions {
        let mut cmd = App::command();
        completions(shell, &mut cmd);
        return Ok(ExitCode::SUCCESS);
    }

    let color_mode = match app.color {
        Some(color_mode) => color_mode,
        None => {
            // Without `--color`, honor the usual environment variables
            // before falling back to `anstream`'s detection.
            if std::env::var("NO_COLOR").is_ok() {
                ColorMode::Never
            } else if std::env::var("FORCE_COLOR").is_ok()
                || std::env::var("CLICOLOR_FORCE").is_ok()
            {
                ColorMode::Always
            } else {
                ColorMode::Auto
            }
        }
    };

    anstream::ColorChoice::write_global(color_mode.into());

    // `anstream` strips the escapes `tracing_indicatif` needs for
    // line control, so no color means no progress bars.
    if matches!(color_mode, ColorMode::Never) {
        app.no_progress = true;
    }

    let indicatif_layer = IndicatifLayer::new();

    let writer = std::sync::Mutex::new(anstream::AutoStream::new(
        Box::new(indicatif_layer.get_stderr_writer()) as Box<dyn Write + Send>,
        color_mode.color_choice_for_terminal(std::io::stderr()),
    ));

    let filter = EnvFilter::builder()
        .with_default_directive(app.verbose.tracing_level_filter().into())
        .from_env()?;

    let reg = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(writer),
        )
        .with(filter);

    if app.no_progress {
        reg.init();
    } else {
        reg.with(indicatif_layer).init();
    }

    let config = Config::new(&app).map_err(|e| {
        anyhow!(tips(
            format!("failed to load config: {e:#}"),
            &["check your configuration file for errors"]
        ))
    })?;

    let token = app
        .api_key
        .clone()
        .ok_or_else(|| anyhow!("no API key given (use --api-key or GITHUB_API_KEY)"))?;
    let api_base = app
        .base_url
        .clone()
        .unwrap_or_else(|| app.gh_hostname.to_api_url());

    let client = Client::new(&api_base, &token, &config)
        .with_context(|| format!("couldn't set up a GitHub API client for {api_base}"))?;

    let user = client
        .test_authentication()
        .await
        .with_context(|| format!("couldn't reach the GitHub API at {api_base}"))?
        .ok_or_else(|| {
            anyhow!(tips(
                "authentication failed: GitHub rejected the API key",
                &[
                    "check that the token hasn't expired or been revoked",
                    "for GitHub Enterprise, pass --gh-hostname or --base-url",
                ]
            ))
        })?;
    tracing::info!(
        "authenticated as {login} against {api_base}",
        login = user.login.cyan()
    );

    if app.token_info {
        let metadata = TokenMetadata::collect(&client, &token).await;
        match app.format {
            OutputFormat::Plain => output::plain::render_token_info(&metadata),
            OutputFormat::Json => output::json::output(stdout(), &metadata)?,
        }
    } else if app.rate_limit {
        let overview = client
            .rate_limit_info()
            .await
            .context("couldn't fetch the rate-limit status")?
            .ok_or_else(|| {
                anyhow!(tips(
                    "rate-limit status unavailable",
                    &["rate limiting may be disabled on this GitHub Enterprise instance"]
                ))
            })?;
        let status = RateLimitStatus::from_overview(&overview, github::ratelimit::now_epoch());
        match app.format {
            OutputFormat::Plain => output::plain::render_rate_limit(&status),
            OutputFormat::Json => output::json::output(stdout(), &status)?,
        }
    } else {
        let prober = Prober::new(
            &client,
            &config,
            app.org.as_deref(),
            app.enterprise_slug.as_deref(),
        )
        .with_creation_test(app.creation_test);
        let report = prober.validate_all().await;
        tracing::info!(
            "{completed} {total} scopes",
            completed = "validated".green(),
            total = report.summary.total_tested
        );

        match app.format {
            OutputFormat::Plain => output::plain::render_report(&report),
            OutputFormat::Json => output::json::output(stdout(), &report)?,
        }
    }

    log_client_stats(&client);

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    // Returning an ExitCode (rather than exiting) lets destructors run.
    match run() {
        Ok(exit) => exit,
        Err(err) => {
            eprintln!(
                "{fatal}: no validation was performed",
                fatal = "fatal".red().bold()
            );
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
    }
}
