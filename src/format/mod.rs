//! Emitter boundary
//!
//! The inverse of the input dispatcher. Only the reference JSON emitter
//! lives in the core — it backs the round-trip laws and the CLI dump;
//! concrete formatters for the other syntaxes are external consumers of
//! the read API.

use thiserror::Error;

use crate::item::Item;

pub mod json;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("no emitter for format '{0}'")]
    UnsupportedFormat(String),
}

/// Serialise `item` in the named format.
pub fn format_data(item: &Item, format: &str, _flavor: Option<&str>) -> Result<String, FormatError> {
    match format {
        "json" => Ok(json::format_json(item)),
        other => Err(FormatError::UnsupportedFormat(other.to_string())),
    }
}
