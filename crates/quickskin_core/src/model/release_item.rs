//! Release item model.

use crate::model::asset::AssetId;
use serde::{Deserialize, Serialize};

/// One entry in a category item table.
///
/// `name` is the primary key within its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseItem {
    pub name: String,
    pub description: Option<String>,
    /// Must reference a row in the shared blob table when set.
    pub icon_asset_id: Option<AssetId>,
}

impl ReleaseItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            icon_asset_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
