//! Core storage and caching for QuickSkin.
//! Workspaces, categories, release items and their image assets.

pub mod asset;
pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use asset::{AssetCache, AssetObserver, AssetState, Placeholders, Resolution};
pub use config::{CoreConfig, StoragePaths};
pub use context::CoreContext;
pub use db::{DbError, RelationalStore};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::{AssetId, Category, NewCategory, ReleaseItem, WorkingMode, Workspace};
pub use repo::{EntityRepository, RepoError, RepoResult};
pub use service::{
    CategoryError, CategoryStore, NewWorkspace, RegistryError, WorkspaceRegistry,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
