//! SQL identifier guard.
//!
//! Table and column names are the only text ever spliced into SQL. They are
//! programmer- or system-generated, but category tables are named after
//! category ids at runtime, so every name crosses this boundary first.

use super::{DbError, DbResult};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_IDENTIFIER_LEN: usize = 64;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Returns whether `name` may be used as a table or column identifier.
pub fn is_safe_identifier(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LEN
        && IDENTIFIER_RE.is_match(name)
        && !name.to_ascii_lowercase().starts_with("sqlite_")
}

/// Validates one identifier, returning it unchanged on success.
pub fn validate_identifier(name: &str) -> DbResult<&str> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Validates and double-quotes one identifier for SQL text.
pub fn quote_identifier(name: &str) -> DbResult<String> {
    validate_identifier(name).map(|name| format!("\"{name}\""))
}
