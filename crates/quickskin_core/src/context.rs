//! Process bootstrap wiring.
//!
//! Builds the single asset cache and the workspace registry from one
//! `CoreConfig`. Logging is initialized separately by the host
//! (`logging::init_from_config`).

use crate::asset::{AssetCache, PngCodec, SqliteBlobStore};
use crate::config::{CoreConfig, StoragePaths};
use crate::service::{CategoryStore, RegistryResult, WorkspaceRegistry};
use log::info;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Long-lived core services shared by every consumer in the process.
pub struct CoreContext {
    config: CoreConfig,
    assets: Arc<AssetCache>,
    registry: WorkspaceRegistry,
}

impl CoreContext {
    /// Wires the asset cache onto `runtime` and loads the registry.
    pub fn open(config: CoreConfig, runtime: Handle) -> RegistryResult<Self> {
        let paths = config.storage_paths();
        let assets = Arc::new(AssetCache::new(
            Arc::new(SqliteBlobStore::new(paths.blob_db())),
            Arc::new(PngCodec),
            runtime,
            config.asset_cache_capacity,
        ));
        let registry = WorkspaceRegistry::open(paths, Arc::clone(&assets))?;
        info!(
            "event=core_open module=core status=ok data_dir={} workspaces={}",
            config.data_dir.display(),
            registry.list().len()
        );
        Ok(Self {
            config,
            assets,
            registry,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn paths(&self) -> &StoragePaths {
        self.registry.paths()
    }

    pub fn assets(&self) -> &Arc<AssetCache> {
        &self.assets
    }

    pub fn registry(&self) -> &WorkspaceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WorkspaceRegistry {
        &mut self.registry
    }

    /// Shortcut for `registry().open_workspace(id)`.
    pub fn open_workspace(&self, id: &str) -> RegistryResult<CategoryStore> {
        self.registry.open_workspace(id)
    }
}

#[cfg(test)]
mod tests {
    use super::CoreContext;
    use crate::config::CoreConfig;
    use crate::service::NewWorkspace;
    use tokio::runtime::Runtime;

    #[test]
    fn reopened_context_sees_persisted_workspaces() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new().unwrap();
        let config = CoreConfig::with_data_dir(dir.path());

        let created = {
            let mut context = CoreContext::open(config.clone(), runtime.handle().clone()).unwrap();
            let output = dir.path().join("out");
            context
                .registry_mut()
                .create(NewWorkspace::new("Demo", output))
                .unwrap()
        };

        let context = CoreContext::open(config, runtime.handle().clone()).unwrap();
        assert_eq!(context.registry().list(), &[created.clone()]);
        assert!(context.paths().registry_db().exists());

        let categories = context.open_workspace(&created.id).unwrap();
        assert_eq!(categories.list_categories().unwrap().len(), 1);
    }
}
