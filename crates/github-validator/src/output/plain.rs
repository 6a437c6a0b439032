//! "plain" (i.e. human-readable) output.

use anstream::println;
use indexmap::IndexMap;
use owo_colors::OwoColorize;

use crate::{
    github::ratelimit::{RateLimitHealth, RateLimitStatus},
    probe::{
        Confidence, PermissionResult, ValidationReport,
        creation::{CreationResult, CreationTest},
    },
    token::TokenMetadata,
};

fn render_result(result: &PermissionResult) {
    let mark = if result.granted {
        "✓".green().to_string()
    } else if result.is_error() {
        "!".yellow().to_string()
    } else {
        "✗".red().to_string()
    };

    let proxy = match result.confidence {
        Confidence::Proxy => format!(" {}", "(proxy)".dimmed()),
        Confidence::Exact => String::new(),
    };

    println!(
        "  {mark} {permission}: {message}{proxy}",
        permission = result.permission.bold(),
        message = result.message,
    );
}

fn render_section(title: &str, results: &IndexMap<&'static str, PermissionResult>) {
    if results.is_empty() {
        return;
    }

    println!("{}", title.bold().underline());
    for result in results.values() {
        render_result(result);
    }
    println!();
}

pub(crate) fn render_report(report: &ValidationReport) {
    if let Some(user) = &report.authenticated_user {
        match &user.name {
            Some(name) => println!(
                "Authenticated as {login} ({name}, {kind})",
                login = user.login.cyan(),
                kind = user.kind
            ),
            None => println!(
                "Authenticated as {login} ({kind})",
                login = user.login.cyan(),
                kind = user.kind
            ),
        }
        println!();
    }

    render_section("Critical permissions", &report.critical_permissions);
    render_section("Standard permissions", &report.standard_permissions);

    let summary = &report.summary;
    println!(
        "{total} scopes tested: {granted} granted, {denied} denied, {errors} errors",
        total = summary.total_tested.bold(),
        granted = summary.granted.green(),
        denied = summary.denied.red(),
        errors = summary.errors.yellow(),
    );

    if let Some(rate) = &report.rate_limit {
        println!(
            "{remaining}/{limit} API requests remaining",
            remaining = rate.remaining,
            limit = rate.limit
        );
    }

    if let Some(creation) = &report.creation_test {
        println!();
        render_creation_test(creation);
    }
}

fn render_creation_test(creation: &CreationTest) {
    let mark = match creation.result {
        CreationResult::Success => "✓".green().to_string(),
        CreationResult::Forbidden | CreationResult::ValidationError => "✗".red().to_string(),
        CreationResult::Error => "!".yellow().to_string(),
    };

    println!("{}", "Repository creation".bold().underline());
    println!("  {mark} {message}", message = creation.message);

    if let Some(repository) = &creation.repository {
        if !creation.write_confirmed {
            println!(
                "{}: created {repository} but couldn't write to it",
                "warning".yellow().bold()
            );
        }
        if !creation.cleaned_up {
            println!(
                "{}: couldn't delete {repository}, remove it by hand",
                "warning".yellow().bold()
            );
        }
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        items.join(", ")
    }
}

pub(crate) fn render_token_info(metadata: &TokenMetadata) {
    if let Some(user) = &metadata.user {
        println!("{:<18} {} ({})", "User:".bold(), user.login.cyan(), user.kind);
    }
    println!("{:<18} {}", "Token type:".bold(), metadata.token_type.as_str());
    if let Some(kind) = metadata.token_prefix_kind {
        println!("{:<18} {}", "Token prefix:".bold(), kind.as_str());
    }
    println!("{:<18} {}", "Scopes:".bold(), list_or_none(&metadata.scopes));
    println!(
        "{:<18} {}",
        "Accepted scopes:".bold(),
        list_or_none(&metadata.accepted_scopes)
    );

    if !metadata.installations.is_empty() {
        println!("{}", "Installations:".bold());
        for installation in &metadata.installations {
            let account = installation
                .account
                .as_ref()
                .map_or("unknown", |account| account.login.as_str());
            println!(
                "  {slug} on {account} (id {id})",
                slug = installation.app_slug.cyan(),
                id = installation.id
            );
        }
    }

    if let Some(rate) = &metadata.rate_limit {
        println!(
            "{:<18} {}/{}",
            "Rate limit:".bold(),
            rate.remaining,
            rate.limit
        );
    }

    for error in &metadata.errors {
        println!("{}: {error}", "warning".yellow().bold());
    }
}

pub(crate) fn render_rate_limit(status: &RateLimitStatus) {
    let core = &status.core;
    let health = match core.status {
        RateLimitHealth::Healthy => "healthy".green().to_string(),
        RateLimitHealth::Warning => "warning".yellow().to_string(),
        RateLimitHealth::Critical => "critical".red().bold().to_string(),
    };

    println!(
        "{} {remaining}/{limit} remaining ({usage}% used), {health}",
        "Core:".bold(),
        remaining = core.remaining,
        limit = core.limit,
        usage = core.usage_percent,
    );
    if core.seconds_until_reset > 0 {
        println!(
            "      resets in {minutes}m {seconds}s",
            minutes = core.seconds_until_reset / 60,
            seconds = core.seconds_until_reset % 60
        );
    }

    for (name, resource) in [("Search:", status.search), ("GraphQL:", status.graphql)] {
        if let Some(resource) = resource {
            println!(
                "{} {}/{} remaining",
                name.bold(),
                resource.remaining,
                resource.limit
            );
        }
    }

    println!();
    for recommendation in &status.recommendations {
        println!("{}: {recommendation}", "note".cyan().bold());
    }
}
