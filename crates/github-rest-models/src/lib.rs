//! Lenient data models for GitHub's REST API.
//!
//! These models are deliberately incomplete: they cover only the fields
//! needed to reason about what a token can see. Every field is either
//! an `Option` or falls back to its default, identifiers included, so a
//! payload that omits something deserializes cleanly instead of failing.

#![deny(missing_debug_implementations)]

pub mod actions;
pub mod apps;
pub mod codespaces;
pub mod orgs;
pub mod rate_limit;
pub mod repos;
pub mod users;
