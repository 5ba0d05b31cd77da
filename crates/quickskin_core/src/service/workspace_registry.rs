//! Workspace catalog service.
//!
//! # Responsibility
//! - Own the in-memory workspace listing and keep it in step with the
//!   registry table.
//! - Validate workspace fields before any write.
//! - Hand out the per-workspace `CategoryStore`.
//!
//! # Invariants
//! - `output_path` is unique across workspaces.
//! - Listing changes only after the matching storage write succeeded.
//! - Deleting a workspace never touches its category database file.

use super::category_store::{CategoryError, CategoryStore};
use crate::asset::{AssetCache, AssetError};
use crate::config::StoragePaths;
use crate::db::{DbError, RelationalStore};
use crate::model::{AssetId, WorkingMode, Workspace, WorkspaceId};
use crate::repo::entity::{optional_text_value, text_value};
use crate::repo::workspace_repo::path_text;
use crate::repo::{open_workspace_repository, RepoError, WorkspaceRepository};
use chrono::Utc;
use image::DynamicImage;
use log::{info, warn};
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Service error for workspace catalog use-cases.
#[derive(Debug)]
pub enum RegistryError {
    BlankName,
    /// Path field must be absolute.
    RelativePath { field: &'static str, path: PathBuf },
    /// Path field is not valid UTF-8 and cannot be stored unchanged.
    NonUtf8Path { field: &'static str, path: PathBuf },
    /// Another workspace already writes to this output directory.
    DuplicateOutputPath(PathBuf),
    /// Malformed repository call (e.g. mismatched partial update).
    InvalidArgument(String),
    WorkspaceNotFound(WorkspaceId),
    Repo(RepoError),
    Asset(AssetError),
    Category(CategoryError),
}

impl RegistryError {
    /// Returns whether the request was rejected before any mutation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::BlankName
                | Self::RelativePath { .. }
                | Self::NonUtf8Path { .. }
                | Self::DuplicateOutputPath(_)
                | Self::InvalidArgument(_)
        )
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "workspace name must not be blank"),
            Self::RelativePath { field, path } => {
                write!(f, "{field} must be absolute, got `{}`", path.display())
            }
            Self::NonUtf8Path { field, path } => {
                write!(f, "{field} must be valid UTF-8, got `{}`", path.display())
            }
            Self::DuplicateOutputPath(path) => write!(
                f,
                "output path `{}` is already used by another workspace",
                path.display()
            ),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::WorkspaceNotFound(id) => write!(f, "workspace not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Asset(err) => write!(f, "{err}"),
            Self::Category(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Asset(err) => Some(err),
            Self::Category(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RegistryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InvalidArgument(message) => Self::InvalidArgument(message),
            RepoError::NotFound { key, .. } => Self::WorkspaceNotFound(key),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for RegistryError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<AssetError> for RegistryError {
    fn from(value: AssetError) -> Self {
        Self::Asset(value)
    }
}

impl From<CategoryError> for RegistryError {
    fn from(value: CategoryError) -> Self {
        Self::Category(value)
    }
}

/// User-supplied fields for a new workspace.
#[derive(Debug, Clone)]
pub struct NewWorkspace {
    pub name: String,
    pub input_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub working_mode: WorkingMode,
    /// Stored through the asset cache under a fresh asset id.
    pub icon: Option<DynamicImage>,
}

impl NewWorkspace {
    pub fn new(name: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            input_path: None,
            output_path: output_path.into(),
            working_mode: WorkingMode::default(),
            icon: None,
        }
    }
}

/// Catalog of workspaces backed by the registry database.
pub struct WorkspaceRegistry {
    paths: StoragePaths,
    assets: Arc<AssetCache>,
    workspaces: Vec<Workspace>,
}

impl WorkspaceRegistry {
    /// Loads every workspace row from the registry database.
    pub fn open(paths: StoragePaths, assets: Arc<AssetCache>) -> RegistryResult<Self> {
        let store = RelationalStore::open(paths.registry_db())?;
        let workspaces = open_workspace_repository(&store)?.get_all()?;
        info!(
            "event=workspace_load module=service status=ok count={}",
            workspaces.len()
        );
        Ok(Self {
            paths,
            assets,
            workspaces,
        })
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Workspaces in creation order.
    pub fn list(&self) -> &[Workspace] {
        &self.workspaces
    }

    pub fn get(&self, id: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|workspace| workspace.id == id)
    }

    /// Validates, stores the optional icon, then inserts the row.
    pub fn create(&mut self, fields: NewWorkspace) -> RegistryResult<Workspace> {
        let name = required_name(&fields.name)?;
        validate_path("output_path", &fields.output_path)?;
        if let Some(input_path) = &fields.input_path {
            validate_path("input_path", input_path)?;
        }

        let store = self.open_store()?;
        let repo = open_workspace_repository(&store)?;
        if repo.find_by_output_path(&fields.output_path)?.is_some() {
            return Err(RegistryError::DuplicateOutputPath(fields.output_path));
        }
        let id = allocate_id(&repo)?;

        let icon_asset_id = match fields.icon {
            Some(image) => {
                let asset_id = AssetId::generate();
                self.assets.set(&asset_id, image)?;
                Some(asset_id)
            }
            None => None,
        };

        let workspace = Workspace {
            id,
            name,
            input_path: fields.input_path,
            output_path: fields.output_path,
            working_mode: fields.working_mode,
            icon_asset_id,
        };
        repo.insert(&workspace)?;
        self.workspaces.push(workspace.clone());

        info!(
            "event=workspace_create module=service status=ok workspace_id={} mode={:?}",
            workspace.id, workspace.working_mode
        );
        Ok(workspace)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> RegistryResult<()> {
        let name = required_name(name)?;
        self.write_fields(id, &["name"], vec![text_value(&name)])?;
        self.entry_mut(id)?.name = name;
        Ok(())
    }

    pub fn update_input_path(&mut self, id: &str, input_path: Option<PathBuf>) -> RegistryResult<()> {
        if let Some(path) = &input_path {
            validate_path("input_path", path)?;
        }
        let value = optional_text_value(input_path.as_deref().map(path_text));
        self.write_fields(id, &["input_path"], vec![value])?;
        self.entry_mut(id)?.input_path = input_path;
        Ok(())
    }

    /// Moves the output directory; the new path must not belong to another
    /// workspace.
    pub fn update_output_path(&mut self, id: &str, output_path: PathBuf) -> RegistryResult<()> {
        validate_path("output_path", &output_path)?;
        {
            let store = self.open_store()?;
            let repo = open_workspace_repository(&store)?;
            if let Some(owner) = repo.find_by_output_path(&output_path)? {
                if owner.id != id {
                    return Err(RegistryError::DuplicateOutputPath(output_path));
                }
            }
        }
        self.write_fields(id, &["output_path"], vec![text_value(&path_text(&output_path))])?;
        self.entry_mut(id)?.output_path = output_path;
        Ok(())
    }

    pub fn update_working_mode(&mut self, id: &str, working_mode: WorkingMode) -> RegistryResult<()> {
        self.write_fields(
            id,
            &["working_mode"],
            vec![Value::Integer(working_mode.to_db())],
        )?;
        self.entry_mut(id)?.working_mode = working_mode;
        Ok(())
    }

    /// Stores or clears the workspace icon.
    ///
    /// A new image reuses the current asset id when there is one. Clearing
    /// unlinks the column before deleting the asset.
    pub fn update_icon(
        &mut self,
        id: &str,
        icon: Option<DynamicImage>,
    ) -> RegistryResult<Option<AssetId>> {
        let current = self
            .get(id)
            .ok_or_else(|| RegistryError::WorkspaceNotFound(id.to_string()))?
            .icon_asset_id
            .clone();

        match icon {
            Some(image) => {
                let asset_id = current.clone().unwrap_or_else(AssetId::generate);
                self.assets.set(&asset_id, image)?;
                if current.as_ref() != Some(&asset_id) {
                    self.write_fields(id, &["icon_asset_id"], vec![text_value(asset_id.as_str())])?;
                    self.entry_mut(id)?.icon_asset_id = Some(asset_id.clone());
                }
                Ok(Some(asset_id))
            }
            None => {
                if let Some(asset_id) = current {
                    self.write_fields(id, &["icon_asset_id"], vec![Value::Null])?;
                    self.entry_mut(id)?.icon_asset_id = None;
                    self.assets.delete(&asset_id)?;
                }
                Ok(None)
            }
        }
    }

    /// Deletes the registry row, then the icon asset, then the listing entry.
    ///
    /// The workspace's category database file is left on disk.
    pub fn delete(&mut self, id: &str) -> RegistryResult<Workspace> {
        let index = self
            .workspaces
            .iter()
            .position(|workspace| workspace.id == id)
            .ok_or_else(|| RegistryError::WorkspaceNotFound(id.to_string()))?;

        {
            let store = self.open_store()?;
            open_workspace_repository(&store)?.delete(id)?;
        }

        let workspace = self.workspaces.remove(index);
        if let Some(asset_id) = &workspace.icon_asset_id {
            if let Err(err) = self.assets.delete(asset_id) {
                warn!(
                    "event=workspace_delete module=service status=partial workspace_id={} asset_id={} error={}",
                    workspace.id, asset_id, err
                );
            }
        }

        info!(
            "event=workspace_delete module=service status=ok workspace_id={}",
            workspace.id
        );
        Ok(workspace)
    }

    /// Returns the category service of a known workspace with its default
    /// category provisioned.
    pub fn open_workspace(&self, id: &str) -> RegistryResult<CategoryStore> {
        let workspace = self
            .get(id)
            .ok_or_else(|| RegistryError::WorkspaceNotFound(id.to_string()))?;
        let categories = CategoryStore::new(
            self.paths.category_db(&workspace.id),
            Arc::clone(&self.assets),
        );
        categories.ensure_default_category()?;
        Ok(categories)
    }

    fn open_store(&self) -> RegistryResult<RelationalStore> {
        Ok(RelationalStore::open(self.paths.registry_db())?)
    }

    fn entry_mut(&mut self, id: &str) -> RegistryResult<&mut Workspace> {
        self.workspaces
            .iter_mut()
            .find(|workspace| workspace.id == id)
            .ok_or_else(|| RegistryError::WorkspaceNotFound(id.to_string()))
    }

    fn write_fields(
        &self,
        id: &str,
        fields: &[&str],
        values: Vec<Value>,
    ) -> RegistryResult<()> {
        if self.get(id).is_none() {
            return Err(RegistryError::WorkspaceNotFound(id.to_string()));
        }
        let store = self.open_store()?;
        open_workspace_repository(&store)?.update_fields(id, fields, &values)?;
        Ok(())
    }
}

/// Timestamp-derived id, suffixed when the millisecond is already taken.
fn allocate_id(repo: &WorkspaceRepository<'_>) -> RegistryResult<WorkspaceId> {
    let base = Workspace::id_from_timestamp(Utc::now());
    if !repo.exists(&base)? {
        return Ok(base);
    }
    let mut suffix = 1u32;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !repo.exists(&candidate)? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

fn required_name(name: &str) -> RegistryResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::BlankName);
    }
    Ok(trimmed.to_string())
}

/// Paths must be absolute and valid UTF-8 so they round-trip through the
/// TEXT column unchanged.
fn validate_path(field: &'static str, path: &Path) -> RegistryResult<()> {
    if path.to_str().is_none() {
        return Err(RegistryError::NonUtf8Path {
            field,
            path: path.to_path_buf(),
        });
    }
    if !path.is_absolute() {
        return Err(RegistryError::RelativePath {
            field,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
