//! Generic CRUD facade over one table for one entity kind.
//!
//! # Responsibility
//! - Ensure the table exists on open.
//! - Provide get/list/count/insert/update/delete/exists by primary key.
//!
//! # Invariants
//! - The table name is validated before any statement is built.
//! - Partial updates only touch declared non-key columns.

use super::entity::{text_value, Entity, RowReader};
use super::{RepoError, RepoResult};
use crate::db::{quote_identifier, validate_identifier, Record, RelationalStore};
use rusqlite::types::Value;
use std::marker::PhantomData;

/// Repository bound to one table of `T` rows.
pub struct EntityRepository<'store, T: Entity> {
    store: &'store RelationalStore,
    table: String,
    _entity: PhantomData<fn() -> T>,
}

impl<'store, T: Entity> EntityRepository<'store, T> {
    /// Binds to `table`, creating it with `T::COLUMNS` when absent.
    pub fn open(store: &'store RelationalStore, table: impl Into<String>) -> RepoResult<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        store.create_table_if_absent(&table, T::COLUMNS)?;
        Ok(Self {
            store,
            table,
            _entity: PhantomData,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn store(&self) -> &'store RelationalStore {
        self.store
    }

    /// Loads one entity by primary key.
    pub fn get(&self, key: &str) -> RepoResult<Option<T>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = :key;",
            quote_identifier(&self.table)?,
            quote_identifier(T::KEY_COLUMN)?
        );
        let rows = self.store.query(&sql, &[("key", text_value(key))])?;
        rows.first().map(|record| self.map_row(record)).transpose()
    }

    /// Loads every entity in insertion order.
    pub fn get_all(&self) -> RepoResult<Vec<T>> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY rowid ASC;",
            quote_identifier(&self.table)?
        );
        self.store
            .query(&sql, &[])?
            .iter()
            .map(|record| self.map_row(record))
            .collect()
    }

    /// Loads every entity whose `column` equals `value`.
    pub fn find_by(&self, column: &str, value: Value) -> RepoResult<Vec<T>> {
        if !T::COLUMNS.iter().any(|def| def.name == column) {
            return Err(RepoError::InvalidArgument(format!(
                "unknown {} column `{column}`",
                T::KIND
            )));
        }

        let sql = format!(
            "SELECT * FROM {} WHERE {} = :value ORDER BY rowid ASC;",
            quote_identifier(&self.table)?,
            quote_identifier(column)?
        );
        self.store
            .query(&sql, &[("value", value)])?
            .iter()
            .map(|record| self.map_row(record))
            .collect()
    }

    pub fn count(&self) -> RepoResult<usize> {
        let sql = format!(
            "SELECT COUNT(*) AS cnt FROM {};",
            quote_identifier(&self.table)?
        );
        let rows = self.store.query(&sql, &[])?;
        let count = rows
            .first()
            .map(|record| RowReader::new(&self.table, record).integer("cnt"))
            .transpose()?
            .unwrap_or(0);
        usize::try_from(count).map_err(|_| RepoError::integrity(&self.table, "cnt", "negative count"))
    }

    pub fn insert(&self, entity: &T) -> RepoResult<()> {
        ensure_key(entity.key())?;
        self.store.insert(&self.table, &entity.to_values())?;
        Ok(())
    }

    /// Replaces every non-key column of the row keyed by `entity.key()`.
    pub fn update(&self, entity: &T) -> RepoResult<()> {
        ensure_key(entity.key())?;
        let values: Vec<(&str, Value)> = entity
            .to_values()
            .into_iter()
            .filter(|(column, _)| *column != T::KEY_COLUMN)
            .collect();
        self.update_row(entity.key(), &values)
    }

    /// Updates selected columns of one row.
    ///
    /// # Errors
    /// - `InvalidArgument` when `key` is empty, `fields` and `values` differ in
    ///   length, `fields` is empty, or a field is not an updatable column.
    /// - `NotFound` when no row has `key`.
    pub fn update_fields(&self, key: &str, fields: &[&str], values: &[Value]) -> RepoResult<()> {
        ensure_key(key)?;
        if fields.len() != values.len() {
            return Err(RepoError::InvalidArgument(format!(
                "{} field names and values differ in length ({} vs {})",
                T::KIND,
                fields.len(),
                values.len()
            )));
        }
        if fields.is_empty() {
            return Err(RepoError::InvalidArgument(
                "partial update needs at least one field".to_string(),
            ));
        }
        if let Some(field) = fields.iter().find(|field| !T::is_updatable_column(field)) {
            return Err(RepoError::InvalidArgument(format!(
                "`{field}` is not an updatable {} column",
                T::KIND
            )));
        }

        let set_values: Vec<(&str, Value)> = fields
            .iter()
            .copied()
            .zip(values.iter().cloned())
            .collect();
        self.update_row(key, &set_values)
    }

    /// Deletes one row; returns whether a row was removed.
    pub fn delete(&self, key: &str) -> RepoResult<bool> {
        let removed = self.store.delete(
            &self.table,
            &format!("{} = :key", quote_identifier(T::KEY_COLUMN)?),
            &[("key", text_value(key))],
        )?;
        Ok(removed > 0)
    }

    pub fn exists(&self, key: &str) -> RepoResult<bool> {
        let sql = format!(
            "SELECT 1 AS present FROM {} WHERE {} = :key LIMIT 1;",
            quote_identifier(&self.table)?,
            quote_identifier(T::KEY_COLUMN)?
        );
        Ok(!self.store.query(&sql, &[("key", text_value(key))])?.is_empty())
    }

    fn update_row(&self, key: &str, set_values: &[(&str, Value)]) -> RepoResult<()> {
        let changed = self.store.update(
            &self.table,
            set_values,
            &format!("{} = :key", quote_identifier(T::KEY_COLUMN)?),
            &[("key", text_value(key))],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: self.table.clone(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn map_row(&self, record: &Record) -> RepoResult<T> {
        T::from_row(&RowReader::new(&self.table, record))
    }
}

fn ensure_key(key: &str) -> RepoResult<()> {
    if key.trim().is_empty() {
        return Err(RepoError::InvalidArgument("key must not be empty".to_string()));
    }
    Ok(())
}
