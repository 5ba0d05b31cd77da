//! Core configuration and storage path resolution.
//!
//! # Responsibility
//! - Carry host-supplied settings into core bootstrap.
//! - Resolve registry/blob/category database locations under `data_dir`.
//!
//! # Invariants
//! - Every field has a default, so partial settings documents deserialize.
//! - Category databases live at `<data_dir>/<workspace_id>/category.db`.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const REGISTRY_DB_FILE_NAME: &str = "base.db";
const CATEGORY_DB_FILE_NAME: &str = "category.db";
const LOG_DIR_NAME: &str = "logs";
const DEFAULT_ASSET_CACHE_CAPACITY: usize = 128;

/// Settings consumed by `CoreContext::open`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Root for every database file.
    pub data_dir: PathBuf,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute log directory; `<data_dir>/logs` when unset.
    pub log_dir: Option<PathBuf>,
    /// Decoded images kept strongly reachable by the asset cache.
    pub asset_cache_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
            log_level: default_log_level().to_string(),
            log_dir: None,
            asset_cache_capacity: DEFAULT_ASSET_CACHE_CAPACITY,
        }
    }
}

impl CoreConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::new(&self.data_dir)
    }

    pub fn effective_log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(LOG_DIR_NAME))
    }
}

/// Resolves database file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    data_dir: PathBuf,
}

impl StoragePaths {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Process-wide registry database (workspace table).
    pub fn registry_db(&self) -> PathBuf {
        self.data_dir.join(REGISTRY_DB_FILE_NAME)
    }

    /// Database holding the shared image blob table.
    pub fn blob_db(&self) -> PathBuf {
        self.registry_db()
    }

    /// Category database of one workspace.
    pub fn category_db(&self, workspace_id: &str) -> PathBuf {
        self.data_dir.join(workspace_id).join(CATEGORY_DB_FILE_NAME)
    }
}
