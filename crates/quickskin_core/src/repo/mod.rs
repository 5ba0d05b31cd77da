//! Repository layer over the relational store.
//!
//! # Responsibility
//! - Map domain records to table rows and back through the `Entity` trait.
//! - Provide one generic CRUD facade (`EntityRepository<T>`) per table.
//!
//! # Invariants
//! - Opening a repository ensures its table exists (idempotent).
//! - Read paths reject rows missing a required attribute instead of
//!   substituting defaults; nullable attributes map to `None`.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod category_repo;
pub mod entity;
pub mod entity_repo;
pub mod release_item_repo;
pub mod workspace_repo;

pub use category_repo::{open_category_repository, CategoryRepository, CATEGORY_TABLE};
pub use entity::{Entity, RowReader};
pub use entity_repo::EntityRepository;
pub use release_item_repo::{open_item_repository, ReleaseItemRepository};
pub use workspace_repo::{open_workspace_repository, WorkspaceRepository, WORKSPACE_TABLE};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying storage failure.
    Db(DbError),
    /// Persisted row cannot be mapped back to a valid entity.
    DataIntegrity {
        table: String,
        column: String,
        reason: &'static str,
    },
    /// Caller-supplied arguments are malformed; nothing was written.
    InvalidArgument(String),
    /// Update target does not exist.
    NotFound { table: String, key: String },
}

impl RepoError {
    pub(crate) fn integrity(table: &str, column: &str, reason: &'static str) -> Self {
        Self::DataIntegrity {
            table: table.to_string(),
            column: column.to_string(),
            reason,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DataIntegrity {
                table,
                column,
                reason,
            } => write!(f, "invalid persisted data in `{table}.{column}`: {reason}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::NotFound { table, key } => write!(f, "row `{key}` not found in `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::DataIntegrity { .. } => None,
            Self::InvalidArgument(_) => None,
            Self::NotFound { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}
