//! Report rendering.

pub(crate) mod json;
pub(crate) mod plain;
