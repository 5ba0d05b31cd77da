//! Durable tier of the asset cache: the shared image blob table.
//!
//! # Invariants
//! - One row per asset id; `image` may be NULL.
//! - Every call opens its own short-lived store handle, so implementations
//!   are safe to call from background fetch threads.

use crate::db::{ColumnDef, ColumnType, DbResult, RelationalStore};
use crate::model::AssetId;
use log::warn;
use rusqlite::types::Value;
use std::path::{Path, PathBuf};

/// Shared blob table name.
pub const BLOB_TABLE: &str = "image_assets";

const BLOB_COLUMNS: &[ColumnDef] = &[
    ColumnDef::key("id", ColumnType::Text),
    ColumnDef::new("image", ColumnType::Blob),
];

/// Keyed byte storage backing the asset cache.
pub trait BlobStore: Send + Sync {
    /// Returns the stored bytes, or `None` when no (non-NULL) blob exists.
    fn load(&self, id: &AssetId) -> DbResult<Option<Vec<u8>>>;
    /// Inserts or replaces the blob for `id`.
    fn save(&self, id: &AssetId, bytes: &[u8]) -> DbResult<()>;
    fn delete(&self, id: &AssetId) -> DbResult<()>;
    /// Removes every listed id, or none of them when the call fails.
    fn delete_many(&self, ids: &[AssetId]) -> DbResult<()>;
    fn exists(&self, id: &AssetId) -> DbResult<bool>;
}

/// Blob table inside a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteBlobStore {
    db_path: PathBuf,
}

impl SqliteBlobStore {
    /// Binds to `db_path`; the file and table are created lazily.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> DbResult<RelationalStore> {
        let store = RelationalStore::open(&self.db_path)?;
        store.create_table_if_absent(BLOB_TABLE, BLOB_COLUMNS)?;
        Ok(store)
    }
}

impl BlobStore for SqliteBlobStore {
    fn load(&self, id: &AssetId) -> DbResult<Option<Vec<u8>>> {
        let store = self.open()?;
        let rows = store.query(
            "SELECT image FROM image_assets WHERE id = :id;",
            &[("id", id_value(id))],
        )?;

        match rows.first().and_then(|record| record.get("image")) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Blob(bytes)) => Ok(Some(bytes.clone())),
            Some(_) => {
                warn!("event=asset_fetch module=asset status=corrupt reason=non_blob_value id={id}");
                Ok(None)
            }
        }
    }

    fn save(&self, id: &AssetId, bytes: &[u8]) -> DbResult<()> {
        let store = self.open()?;
        store.upsert(
            BLOB_TABLE,
            "id",
            &[("id", id_value(id)), ("image", Value::Blob(bytes.to_vec()))],
        )
    }

    fn delete(&self, id: &AssetId) -> DbResult<()> {
        let store = self.open()?;
        store.delete(BLOB_TABLE, "id = :id", &[("id", id_value(id))])?;
        Ok(())
    }

    fn delete_many(&self, ids: &[AssetId]) -> DbResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let store = self.open()?;
        store.in_transaction(|tx| {
            for id in ids {
                tx.delete(BLOB_TABLE, "id = :id", &[("id", id_value(id))])?;
            }
            Ok(())
        })
    }

    fn exists(&self, id: &AssetId) -> DbResult<bool> {
        let store = self.open()?;
        let rows = store.query(
            "SELECT 1 AS present FROM image_assets WHERE id = :id LIMIT 1;",
            &[("id", id_value(id))],
        )?;
        Ok(!rows.is_empty())
    }
}

fn id_value(id: &AssetId) -> Value {
    Value::Text(id.as_str().to_string())
}
