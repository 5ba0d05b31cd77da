//! Row mapping contract shared by every repository.

use super::{RepoError, RepoResult};
use crate::db::{ColumnDef, Record};
use rusqlite::types::Value;

/// A record type stored one-per-row in a table with a text primary key.
pub trait Entity: Sized {
    /// Short label used in log lines.
    const KIND: &'static str;
    /// Primary key column; must appear in `COLUMNS`.
    const KEY_COLUMN: &'static str;
    /// Fixed table layout, created on repository open.
    const COLUMNS: &'static [ColumnDef];

    fn key(&self) -> &str;

    /// Every column value, key included, in `COLUMNS` order.
    fn to_values(&self) -> Vec<(&'static str, Value)>;

    fn from_row(row: &RowReader<'_>) -> RepoResult<Self>;

    /// Returns whether `column` is a non-key column of this layout.
    fn is_updatable_column(column: &str) -> bool {
        Self::COLUMNS
            .iter()
            .any(|def| !def.primary_key && def.name == column)
    }
}

/// Typed accessors over one record; failures name the offending column.
pub struct RowReader<'a> {
    table: &'a str,
    record: &'a Record,
}

impl<'a> RowReader<'a> {
    pub fn new(table: &'a str, record: &'a Record) -> Self {
        Self { table, record }
    }

    pub fn table(&self) -> &str {
        self.table
    }

    /// Reads a required text column.
    pub fn text(&self, column: &str) -> RepoResult<String> {
        self.optional_text(column)?
            .ok_or_else(|| RepoError::integrity(self.table, column, "required value is missing"))
    }

    /// Reads a nullable text column; an absent column maps to `None`.
    pub fn optional_text(&self, column: &str) -> RepoResult<Option<String>> {
        match self.record.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(value)) => Ok(Some(value.clone())),
            Some(_) => Err(RepoError::integrity(
                self.table,
                column,
                "expected a text value",
            )),
        }
    }

    /// Reads a required integer column.
    pub fn integer(&self, column: &str) -> RepoResult<i64> {
        match self.record.get(column) {
            None | Some(Value::Null) => Err(RepoError::integrity(
                self.table,
                column,
                "required value is missing",
            )),
            Some(Value::Integer(value)) => Ok(*value),
            Some(_) => Err(RepoError::integrity(
                self.table,
                column,
                "expected an integer value",
            )),
        }
    }

    /// Builds an integrity error for a value that is present but unusable.
    pub fn invalid(&self, column: &str, reason: &'static str) -> RepoError {
        RepoError::integrity(self.table, column, reason)
    }
}

pub(crate) fn text_value(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub(crate) fn optional_text_value<S: AsRef<str>>(value: Option<S>) -> Value {
    value.map_or(Value::Null, |value| text_value(value.as_ref()))
}
