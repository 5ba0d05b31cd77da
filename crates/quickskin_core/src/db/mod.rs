//! SQLite storage bootstrap and the relational store wrapper.
//!
//! # Responsibility
//! - Open and configure SQLite connections for registry/category/blob files.
//! - Execute parameterized statements on behalf of repositories.
//!
//! # Invariants
//! - Values are always bound as parameters, never interpolated.
//! - Table/column identifiers pass `ident::validate_identifier` before use.
//! - A failed statement leaves the connection usable.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod ident;
mod open;
pub mod store;

pub use ident::{is_safe_identifier, quote_identifier, validate_identifier};
pub use open::{open_db, open_db_in_memory};
pub use store::{ColumnDef, ColumnType, Record, RelationalStore};

pub type DbResult<T> = Result<T, DbError>;

/// Storage-layer error.
///
/// `Display` carries the statement intent only; the driver error is reachable
/// through `source()`.
#[derive(Debug)]
pub enum DbError {
    /// Database directory could not be prepared.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Opening or executing against SQLite failed.
    Statement {
        intent: String,
        source: rusqlite::Error,
    },
    /// Identifier contains characters outside `[A-Za-z0-9_]`.
    InvalidIdentifier(String),
    /// Insert/update called without any column values.
    EmptyValues(String),
}

impl DbError {
    pub(crate) fn statement(intent: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Statement {
            intent: intent.into(),
            source,
        }
    }

    /// Returns the failed statement intent, if this is an execution failure.
    pub fn intent(&self) -> Option<&str> {
        match self {
            Self::Statement { intent, .. } => Some(intent.as_str()),
            _ => None,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot prepare database path `{}`: {source}", path.display())
            }
            Self::Statement { intent, .. } => write!(f, "storage operation failed: {intent}"),
            Self::InvalidIdentifier(name) => write!(f, "unsafe sql identifier `{name}`"),
            Self::EmptyValues(intent) => write!(f, "no column values supplied for {intent}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Statement { source, .. } => Some(source),
            Self::InvalidIdentifier(_) => None,
            Self::EmptyValues(_) => None,
        }
    }
}
