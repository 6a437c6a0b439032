/// Command-line surface tests: argument parsing and usage errors.
mod cli;
/// Helpers.
mod common;
/// End-to-end runs against a mocked GitHub API.
mod e2e;
