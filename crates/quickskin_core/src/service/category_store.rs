//! Category and release item use-case service for one workspace.
//!
//! # Responsibility
//! - Provision and tear down per-category item tables alongside category rows.
//! - Run the cascading category delete (icons, item table, category row).
//! - Route release item icon writes through the shared asset cache.
//!
//! # Invariants
//! - Every operation opens its own short-lived store handle on `db_path`.
//! - Category ids are system-generated; item table name = category id.
//! - Cascade order is assets -> item table -> category row. A failure midway
//!   leaves at most orphaned assets or a row without a table; neither is
//!   rolled back. The default category self-heals on the next
//!   `ensure_default_category`.

use crate::asset::{AssetCache, AssetError};
use crate::db::{DbError, RelationalStore};
use crate::model::{
    AssetId, Category, CategoryId, NewCategory, ReleaseItem, Tint, DEFAULT_CATEGORY_ID,
};
use crate::repo::entity::optional_text_value;
use crate::repo::{
    open_category_repository, open_item_repository, CategoryRepository, RepoError,
    ReleaseItemRepository,
};
use image::DynamicImage;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type CategoryResult<T> = Result<T, CategoryError>;

/// Service error for category and release item use-cases.
#[derive(Debug)]
pub enum CategoryError {
    /// Category or item name is blank.
    BlankName,
    /// Tint text is not `#rrggbb` / `#aarrggbb`.
    InvalidTint(String),
    /// An item with this name already exists in the category.
    DuplicateItem { category_id: CategoryId, name: String },
    /// Item references an icon asset that is not stored.
    MissingIconAsset(AssetId),
    /// Malformed repository call (e.g. mismatched partial update).
    InvalidArgument(String),
    CategoryNotFound(CategoryId),
    ItemNotFound { category_id: CategoryId, name: String },
    Repo(RepoError),
    Asset(AssetError),
}

impl CategoryError {
    /// Returns whether the request was rejected before any mutation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::BlankName
                | Self::InvalidTint(_)
                | Self::DuplicateItem { .. }
                | Self::MissingIconAsset(_)
                | Self::InvalidArgument(_)
        )
    }
}

impl Display for CategoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::InvalidTint(value) => write!(f, "invalid icon tint `{value}`"),
            Self::DuplicateItem { category_id, name } => {
                write!(f, "item `{name}` already exists in category `{category_id}`")
            }
            Self::MissingIconAsset(id) => write!(f, "icon asset `{id}` is not stored"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::ItemNotFound { category_id, name } => {
                write!(f, "item `{name}` not found in category `{category_id}`")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::Asset(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CategoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Asset(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CategoryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InvalidArgument(message) => Self::InvalidArgument(message),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for CategoryError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<AssetError> for CategoryError {
    fn from(value: AssetError) -> Self {
        Self::Asset(value)
    }
}

/// Category service bound to one workspace's category database.
pub struct CategoryStore {
    db_path: PathBuf,
    assets: Arc<AssetCache>,
}

impl CategoryStore {
    /// Binds to `db_path`; nothing is opened until the first call.
    pub fn new(db_path: impl Into<PathBuf>, assets: Arc<AssetCache>) -> Self {
        Self {
            db_path: db_path.into(),
            assets,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn assets(&self) -> &Arc<AssetCache> {
        &self.assets
    }

    /// Provisions the default category and its item table.
    ///
    /// Idempotent. When the row exists its fields are re-applied and a
    /// missing item table is recreated.
    pub fn ensure_default_category(&self) -> CategoryResult<Category> {
        let store = self.open_store()?;
        let categories = open_category_repository(&store)?;

        let Some(existing) = categories.get(DEFAULT_CATEGORY_ID)? else {
            let category = Category::default_category();
            categories.insert(&category)?;
            open_item_repository(&store, category.item_table())?;
            info!(
                "event=category_create module=service status=ok category_id={} default=true",
                category.id
            );
            return Ok(category);
        };

        categories.update(&existing)?;
        let table_missing = !store.table_exists(existing.item_table())?;
        open_item_repository(&store, existing.item_table())?;
        if table_missing {
            warn!(
                "event=category_heal module=service status=ok category_id={} table={}",
                existing.id,
                existing.item_table()
            );
        }
        Ok(existing)
    }

    /// Lists categories in creation order.
    pub fn list_categories(&self) -> CategoryResult<Vec<Category>> {
        let store = self.open_store()?;
        Ok(open_category_repository(&store)?.get_all()?)
    }

    pub fn get_category(&self, id: &str) -> CategoryResult<Option<Category>> {
        let store = self.open_store()?;
        Ok(open_category_repository(&store)?.get(id)?)
    }

    /// Returns the id of the first category named `name`.
    pub fn category_id_by_name(&self, name: &str) -> CategoryResult<Option<CategoryId>> {
        let store = self.open_store()?;
        Ok(open_category_repository(&store)?.id_by_name(name)?)
    }

    /// Creates a category row and its item table under a fresh id.
    ///
    /// If table creation fails after the row insert, the row stays behind
    /// without a table.
    pub fn create_category(&self, fields: NewCategory) -> CategoryResult<Category> {
        let name = required_name(&fields.name)?;
        let icon_tint = parse_tint(fields.icon_tint.as_deref())?;
        let category = Category {
            id: Category::generate_id(),
            name,
            icon_key: fields.icon_key,
            icon_tint,
            description: fields.description,
        };

        let store = self.open_store()?;
        open_category_repository(&store)?.insert(&category)?;
        open_item_repository(&store, category.item_table())?;
        info!(
            "event=category_create module=service status=ok category_id={}",
            category.id
        );
        Ok(category)
    }

    /// Replaces every editable field of an existing category.
    pub fn update_category(&self, category: &Category) -> CategoryResult<()> {
        required_name(&category.name)?;
        let store = self.open_store()?;
        open_category_repository(&store)?
            .update(category)
            .map_err(|err| category_not_found(err, &category.id))
    }

    /// Deletes a category and everything that depends on it.
    ///
    /// Returns the category the caller should select next when `current` was
    /// the deleted one. Deleting the default category is allowed; the
    /// returned replacement is then a freshly provisioned default.
    pub fn delete_category(
        &self,
        id: &str,
        current: Option<&str>,
    ) -> CategoryResult<Option<Category>> {
        {
            let store = self.open_store()?;
            let categories = open_category_repository(&store)?;
            let category = categories
                .get(id)?
                .ok_or_else(|| CategoryError::CategoryNotFound(id.to_string()))?;
            let table = category.item_table();

            let icon_ids = if store.table_exists(table)? {
                open_item_repository(&store, table)?.icon_asset_ids()?
            } else {
                Vec::new()
            };
            self.assets.delete_many(&icon_ids)?;
            store.drop_table_if_exists(table)?;
            categories.delete(&category.id)?;

            info!(
                "event=category_delete module=service status=ok category_id={} assets={}",
                category.id,
                icon_ids.len()
            );
        }

        if current == Some(id) {
            return self.ensure_default_category().map(Some);
        }
        Ok(None)
    }

    /// Lists the items of one category in insertion order.
    pub fn list_release_items(&self, category_id: &str) -> CategoryResult<Vec<ReleaseItem>> {
        self.with_items(category_id, |items| Ok(items.get_all()?))
    }

    pub fn get_release_item(
        &self,
        category_id: &str,
        name: &str,
    ) -> CategoryResult<Option<ReleaseItem>> {
        self.with_items(category_id, |items| Ok(items.get(name)?))
    }

    /// Adds an item under its trimmed name; its icon asset, if referenced,
    /// must already be stored.
    pub fn add_release_item(
        &self,
        category_id: &str,
        mut item: ReleaseItem,
    ) -> CategoryResult<ReleaseItem> {
        item.name = required_name(&item.name)?;
        self.ensure_icon_stored(item.icon_asset_id.as_ref())?;
        self.with_items(category_id, |items| {
            if items.exists(&item.name)? {
                return Err(CategoryError::DuplicateItem {
                    category_id: category_id.to_string(),
                    name: item.name.clone(),
                });
            }
            items.insert(&item)?;
            Ok(item)
        })
    }

    /// Replaces the description and icon reference of an existing item.
    pub fn update_release_item(&self, category_id: &str, item: &ReleaseItem) -> CategoryResult<()> {
        self.ensure_icon_stored(item.icon_asset_id.as_ref())?;
        self.with_items(category_id, |items| {
            items
                .update(item)
                .map_err(|err| item_not_found(err, category_id, &item.name))
        })
    }

    /// Stores or clears the icon of an existing item.
    ///
    /// A new image reuses the item's asset id when it has one. Clearing
    /// unlinks the column before deleting the asset.
    pub fn set_release_item_icon(
        &self,
        category_id: &str,
        name: &str,
        image: Option<DynamicImage>,
    ) -> CategoryResult<Option<AssetId>> {
        let item = self
            .get_release_item(category_id, name)?
            .ok_or_else(|| CategoryError::ItemNotFound {
                category_id: category_id.to_string(),
                name: name.to_string(),
            })?;

        match image {
            Some(image) => {
                let asset_id = item.icon_asset_id.clone().unwrap_or_else(AssetId::generate);
                self.assets.set(&asset_id, image)?;
                if item.icon_asset_id.as_ref() != Some(&asset_id) {
                    self.link_icon(category_id, name, Some(&asset_id))?;
                }
                Ok(Some(asset_id))
            }
            None => {
                if let Some(asset_id) = item.icon_asset_id {
                    self.link_icon(category_id, name, None)?;
                    self.assets.delete(&asset_id)?;
                }
                Ok(None)
            }
        }
    }

    /// Deletes an item's icon asset, then its row.
    ///
    /// Returns `false` when the item does not exist.
    pub fn delete_release_item(&self, category_id: &str, name: &str) -> CategoryResult<bool> {
        self.with_items(category_id, |items| {
            let Some(item) = items.get(name)? else {
                return Ok(false);
            };
            if let Some(asset_id) = &item.icon_asset_id {
                self.assets.delete(asset_id)?;
            }
            Ok(items.delete(name)?)
        })
    }

    fn open_store(&self) -> CategoryResult<RelationalStore> {
        Ok(RelationalStore::open(&self.db_path)?)
    }

    fn with_items<R>(
        &self,
        category_id: &str,
        op: impl FnOnce(&ReleaseItemRepository<'_>) -> CategoryResult<R>,
    ) -> CategoryResult<R> {
        let store = self.open_store()?;
        let category = lookup_category(&open_category_repository(&store)?, category_id)?;
        let items = open_item_repository(&store, category.item_table())?;
        op(&items)
    }

    fn link_icon(
        &self,
        category_id: &str,
        name: &str,
        asset_id: Option<&AssetId>,
    ) -> CategoryResult<()> {
        self.with_items(category_id, |items| {
            items
                .update_fields(name, &["icon_asset_id"], &[optional_text_value(asset_id)])
                .map_err(|err| item_not_found(err, category_id, name))
        })
    }

    fn ensure_icon_stored(&self, asset_id: Option<&AssetId>) -> CategoryResult<()> {
        match asset_id {
            Some(id) if !self.assets.exists(id)? => Err(CategoryError::MissingIconAsset(id.clone())),
            _ => Ok(()),
        }
    }
}

fn lookup_category(categories: &CategoryRepository<'_>, id: &str) -> CategoryResult<Category> {
    categories
        .get(id)?
        .ok_or_else(|| CategoryError::CategoryNotFound(id.to_string()))
}

fn required_name(name: &str) -> CategoryResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CategoryError::BlankName);
    }
    Ok(trimmed.to_string())
}

fn parse_tint(value: Option<&str>) -> CategoryResult<Option<Tint>> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Tint::parse(value)
            .map(Some)
            .ok_or_else(|| CategoryError::InvalidTint(value.to_string())),
        None => Ok(None),
    }
}

fn category_not_found(err: RepoError, id: &str) -> CategoryError {
    match err {
        RepoError::NotFound { .. } => CategoryError::CategoryNotFound(id.to_string()),
        other => other.into(),
    }
}

fn item_not_found(err: RepoError, category_id: &str, name: &str) -> CategoryError {
    match err {
        RepoError::NotFound { .. } => CategoryError::ItemNotFound {
            category_id: category_id.to_string(),
            name: name.to_string(),
        },
        other => other.into(),
    }
}

