//! Category row mapping for the per-workspace category table.

use super::entity::{optional_text_value, text_value, Entity, RowReader};
use super::{EntityRepository, RepoResult};
use crate::db::{ColumnDef, ColumnType, RelationalStore};
use crate::model::{Category, CategoryId, Tint};
use rusqlite::types::Value;

/// Table listing every category of one workspace.
pub const CATEGORY_TABLE: &str = "category_map";

pub type CategoryRepository<'store> = EntityRepository<'store, Category>;

pub fn open_category_repository(store: &RelationalStore) -> RepoResult<CategoryRepository<'_>> {
    EntityRepository::open(store, CATEGORY_TABLE)
}

impl Entity for Category {
    const KIND: &'static str = "category";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::key("id", ColumnType::Text),
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("icon_key", ColumnType::Text),
        ColumnDef::new("icon_tint", ColumnType::Text),
        ColumnDef::new("description", ColumnType::Text),
    ];

    fn key(&self) -> &str {
        &self.id
    }

    fn to_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", text_value(&self.id)),
            ("name", text_value(&self.name)),
            ("icon_key", optional_text_value(self.icon_key.as_deref())),
            (
                "icon_tint",
                optional_text_value(self.icon_tint.map(|tint| tint.to_string())),
            ),
            ("description", optional_text_value(self.description.as_deref())),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> RepoResult<Self> {
        let icon_tint = match row.optional_text("icon_tint")? {
            Some(value) => Some(
                Tint::parse(&value).ok_or_else(|| row.invalid("icon_tint", "malformed color"))?,
            ),
            None => None,
        };

        Ok(Self {
            id: row.text("id")?,
            name: row.text("name")?,
            icon_key: row.optional_text("icon_key")?,
            icon_tint,
            description: row.optional_text("description")?,
        })
    }
}

impl EntityRepository<'_, Category> {
    /// Returns the id of the first category named `name`.
    pub fn id_by_name(&self, name: &str) -> RepoResult<Option<CategoryId>> {
        Ok(self
            .find_by("name", text_value(name))?
            .into_iter()
            .next()
            .map(|category| category.id))
    }
}
