//! Synchronous relational store over one SQLite connection.
//!
//! # Responsibility
//! - Create/drop tables from typed column definitions.
//! - Run parameterized insert/update/delete/query statements.
//! - Return query rows as ordered column/value records.
//!
//! # Invariants
//! - Every value travels as a named bound parameter (`:name`).
//! - Every spliced identifier is validated and quoted first.
//! - Errors carry the statement intent, not the SQL text.

use super::ident::{quote_identifier, validate_identifier};
use super::open::{open_db, open_db_in_memory};
use super::{DbError, DbResult};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{Connection, ToSql, Transaction, TransactionBehavior};
use std::path::Path;

/// SQLite storage class of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Blob,
}

impl ColumnType {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Blob => "BLOB",
        }
    }
}

/// One column of a table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnType,
    pub primary_key: bool,
}

impl ColumnDef {
    /// Primary key column.
    pub const fn key(name: &'static str, kind: ColumnType) -> Self {
        Self {
            name,
            kind,
            primary_key: true,
        }
    }

    /// Regular (nullable) column.
    pub const fn new(name: &'static str, kind: ColumnType) -> Self {
        Self {
            name,
            kind,
            primary_key: false,
        }
    }
}

/// One result row; columns keep the order of the select list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    /// Returns the value of `column`, or `None` when the column is absent.
    ///
    /// A present SQL `NULL` is returned as `Some(Value::Null)`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Thin wrapper over one SQLite connection.
///
/// Callers open a store around a unit of work and drop it afterwards; one
/// store instance is never shared between threads.
pub struct RelationalStore {
    conn: Connection,
}

impl RelationalStore {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    /// Creates `table` with `columns` unless it already exists.
    pub fn create_table_if_absent(&self, table: &str, columns: &[ColumnDef]) -> DbResult<()> {
        let intent = format!("create table `{table}`");
        if columns.is_empty() {
            return Err(DbError::EmptyValues(intent));
        }

        let mut column_sql = Vec::with_capacity(columns.len());
        for column in columns {
            let mut definition = format!("{} {}", quote_identifier(column.name)?, column.kind.as_sql());
            if column.primary_key {
                definition.push_str(" PRIMARY KEY");
            }
            column_sql.push(definition);
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            quote_identifier(table)?,
            column_sql.join(", ")
        );
        self.conn
            .execute_batch(&sql)
            .map_err(|err| DbError::statement(intent, err))?;
        debug!("event=table_create module=db status=ok table={table}");
        Ok(())
    }

    /// Drops `table` if present.
    pub fn drop_table_if_exists(&self, table: &str) -> DbResult<()> {
        let sql = format!("DROP TABLE IF EXISTS {};", quote_identifier(table)?);
        self.conn
            .execute_batch(&sql)
            .map_err(|err| DbError::statement(format!("drop table `{table}`"), err))?;
        info!("event=table_drop module=db status=ok table={table}");
        Ok(())
    }

    /// Returns whether a table named `table` exists.
    pub fn table_exists(&self, table: &str) -> DbResult<bool> {
        let rows = self.query(
            "SELECT 1 AS present FROM sqlite_master WHERE type = 'table' AND name = :name;",
            &[("name", Value::Text(validate_identifier(table)?.to_string()))],
        )?;
        Ok(!rows.is_empty())
    }

    /// Inserts one row built from `(column, value)` pairs.
    pub fn insert(&self, table: &str, values: &[(&str, Value)]) -> DbResult<()> {
        let intent = format!("insert into `{table}`");
        if values.is_empty() {
            return Err(DbError::EmptyValues(intent));
        }

        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        let mut bound = Vec::with_capacity(values.len());
        for (column, value) in values {
            columns.push(quote_identifier(column)?);
            placeholders.push(format!(":{column}"));
            bound.push((format!(":{column}"), value.clone()));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            quote_identifier(table)?,
            columns.join(", "),
            placeholders.join(", ")
        );
        self.execute(&intent, &sql, &bound).map(|_| ())
    }

    /// Inserts one row, or overwrites the non-key columns of the row already
    /// holding the same `key_column` value. Runs as a single statement.
    pub fn upsert(&self, table: &str, key_column: &str, values: &[(&str, Value)]) -> DbResult<()> {
        let intent = format!("upsert into `{table}`");
        if values.is_empty() {
            return Err(DbError::EmptyValues(intent));
        }

        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        let mut assignments = Vec::with_capacity(values.len());
        let mut bound = Vec::with_capacity(values.len());
        for (column, value) in values {
            let quoted = quote_identifier(column)?;
            if *column != key_column {
                assignments.push(format!("{quoted} = excluded.{quoted}"));
            }
            columns.push(quoted);
            placeholders.push(format!(":{column}"));
            bound.push((format!(":{column}"), value.clone()));
        }

        let conflict = if assignments.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", assignments.join(", "))
        };
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {conflict};",
            quote_identifier(table)?,
            columns.join(", "),
            placeholders.join(", "),
            quote_identifier(key_column)?
        );
        self.execute(&intent, &sql, &bound).map(|_| ())
    }

    /// Runs `work` inside one immediate transaction.
    ///
    /// Commits when `work` returns `Ok`; any error rolls every statement back.
    pub fn in_transaction<T>(&self, work: impl FnOnce(&Self) -> DbResult<T>) -> DbResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(|err| DbError::statement("begin transaction", err))?;
        let value = work(self)?;
        tx.commit()
            .map_err(|err| DbError::statement("commit transaction", err))?;
        Ok(value)
    }

    /// Updates rows matching `where_clause`; returns the number of changed rows.
    ///
    /// `where_clause` names its parameters as `:name`; `where_params` supplies
    /// them without the colon.
    pub fn update(
        &self,
        table: &str,
        set_values: &[(&str, Value)],
        where_clause: &str,
        where_params: &[(&str, Value)],
    ) -> DbResult<usize> {
        let intent = format!("update `{table}`");
        if set_values.is_empty() {
            return Err(DbError::EmptyValues(intent));
        }

        let mut assignments = Vec::with_capacity(set_values.len());
        let mut bound = Vec::with_capacity(set_values.len() + where_params.len());
        for (column, value) in set_values {
            assignments.push(format!("{} = :set_{column}", quote_identifier(column)?));
            bound.push((format!(":set_{column}"), value.clone()));
        }
        bound.extend(bind_names(where_params)?);

        let sql = format!(
            "UPDATE {} SET {} WHERE {where_clause};",
            quote_identifier(table)?,
            assignments.join(", ")
        );
        self.execute(&intent, &sql, &bound)
    }

    /// Deletes rows matching `where_clause`; returns the number of removed rows.
    pub fn delete(
        &self,
        table: &str,
        where_clause: &str,
        where_params: &[(&str, Value)],
    ) -> DbResult<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {where_clause};",
            quote_identifier(table)?
        );
        let bound = bind_names(where_params)?;
        self.execute(&format!("delete from `{table}`"), &sql, &bound)
    }

    /// Runs a parameterized query and collects every row.
    pub fn query(&self, sql: &str, params: &[(&str, Value)]) -> DbResult<Vec<Record>> {
        let intent = "query";
        let bound = bind_names(params)?;
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|err| DbError::statement(intent, err))?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt
            .query(as_named_params(&bound).as_slice())
            .map_err(|err| DbError::statement(intent, err))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(|err| DbError::statement(intent, err))? {
            let mut record = Vec::with_capacity(names.len());
            for (index, name) in names.iter().enumerate() {
                let value: Value = row
                    .get(index)
                    .map_err(|err| DbError::statement(intent, err))?;
                record.push((name.clone(), value));
            }
            records.push(record.into_iter().collect());
        }

        Ok(records)
    }

    fn execute(&self, intent: &str, sql: &str, bound: &[(String, Value)]) -> DbResult<usize> {
        self.conn
            .execute(sql, as_named_params(bound).as_slice())
            .map_err(|err| DbError::statement(intent, err))
    }
}

fn bind_names(params: &[(&str, Value)]) -> DbResult<Vec<(String, Value)>> {
    params
        .iter()
        .map(|(name, value)| Ok((format!(":{}", validate_identifier(name)?), value.clone())))
        .collect()
}

fn as_named_params(bound: &[(String, Value)]) -> Vec<(&str, &dyn ToSql)> {
    bound
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}
