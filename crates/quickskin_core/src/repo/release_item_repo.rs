//! Release item row mapping for per-category item tables.

use super::entity::{optional_text_value, text_value, Entity, RowReader};
use super::{EntityRepository, RepoResult};
use crate::db::{ColumnDef, ColumnType, RelationalStore};
use crate::model::{AssetId, ReleaseItem};
use rusqlite::types::Value;

pub type ReleaseItemRepository<'store> = EntityRepository<'store, ReleaseItem>;

/// Opens (creating if absent) the item table named after `category_id`.
pub fn open_item_repository<'store>(
    store: &'store RelationalStore,
    category_id: &str,
) -> RepoResult<ReleaseItemRepository<'store>> {
    EntityRepository::open(store, category_id)
}

impl Entity for ReleaseItem {
    const KIND: &'static str = "release item";
    const KEY_COLUMN: &'static str = "name";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::key("name", ColumnType::Text),
        ColumnDef::new("description", ColumnType::Text),
        ColumnDef::new("icon_asset_id", ColumnType::Text),
    ];

    fn key(&self) -> &str {
        &self.name
    }

    fn to_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", text_value(&self.name)),
            ("description", optional_text_value(self.description.as_deref())),
            (
                "icon_asset_id",
                optional_text_value(self.icon_asset_id.as_ref()),
            ),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> RepoResult<Self> {
        Ok(Self {
            name: row.text("name")?,
            description: row.optional_text("description")?,
            icon_asset_id: row.optional_text("icon_asset_id")?.map(AssetId::from),
        })
    }
}

impl EntityRepository<'_, ReleaseItem> {
    /// Collects the icon asset ids referenced by every item in this table.
    pub fn icon_asset_ids(&self) -> RepoResult<Vec<AssetId>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter_map(|item| item.icon_asset_id)
            .collect())
    }
}
