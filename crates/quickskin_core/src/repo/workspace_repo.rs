//! Workspace row mapping and registry-table queries.

use super::entity::{optional_text_value, text_value, Entity, RowReader};
use super::{EntityRepository, RepoResult};
use crate::db::{ColumnDef, ColumnType, RelationalStore};
use crate::model::{AssetId, WorkingMode, Workspace};
use rusqlite::types::Value;
use std::path::{Path, PathBuf};

/// Registry table holding one row per workspace.
pub const WORKSPACE_TABLE: &str = "workspaces";

pub type WorkspaceRepository<'store> = EntityRepository<'store, Workspace>;

/// Opens the workspace table inside the registry database.
pub fn open_workspace_repository(store: &RelationalStore) -> RepoResult<WorkspaceRepository<'_>> {
    EntityRepository::open(store, WORKSPACE_TABLE)
}

impl Entity for Workspace {
    const KIND: &'static str = "workspace";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::key("id", ColumnType::Text),
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("input_path", ColumnType::Text),
        ColumnDef::new("output_path", ColumnType::Text),
        ColumnDef::new("working_mode", ColumnType::Integer),
        ColumnDef::new("icon_asset_id", ColumnType::Text),
    ];

    fn key(&self) -> &str {
        &self.id
    }

    fn to_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", text_value(&self.id)),
            ("name", text_value(&self.name)),
            (
                "input_path",
                optional_text_value(self.input_path.as_deref().map(path_text)),
            ),
            ("output_path", text_value(&path_text(&self.output_path))),
            ("working_mode", Value::Integer(self.working_mode.to_db())),
            (
                "icon_asset_id",
                optional_text_value(self.icon_asset_id.as_ref()),
            ),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> RepoResult<Self> {
        let working_mode = WorkingMode::from_db(row.integer("working_mode")?)
            .ok_or_else(|| row.invalid("working_mode", "unknown working mode"))?;

        Ok(Self {
            id: row.text("id")?,
            name: row.text("name")?,
            input_path: row.optional_text("input_path")?.map(PathBuf::from),
            output_path: PathBuf::from(row.text("output_path")?),
            working_mode,
            icon_asset_id: row.optional_text("icon_asset_id")?.map(AssetId::from),
        })
    }
}

impl EntityRepository<'_, Workspace> {
    /// Finds the workspace writing to `output_path`, if any.
    pub fn find_by_output_path(&self, output_path: &Path) -> RepoResult<Option<Workspace>> {
        Ok(self
            .find_by("output_path", text_value(&path_text(output_path)))?
            .into_iter()
            .next())
    }
}

/// Text form of a path. Callers reject non-UTF-8 paths before writing, so
/// the lossy conversion never alters a stored value.
pub(crate) fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
