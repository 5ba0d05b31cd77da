//! Workspace model.
//!
//! # Invariants
//! - `id` is derived from the creation timestamp and never reused.
//! - `output_path` is unique across all workspaces (enforced by the registry).

use crate::model::asset::AssetId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Workspace identifier; also names the workspace's data directory.
pub type WorkspaceId = String;

const WORKSPACE_ID_PREFIX: &str = "workspace_";

/// How release items of a workspace are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingMode {
    /// Items are copied into the output directory as-is.
    #[default]
    Standard,
    /// Items are packed into archives in the output directory.
    Archive,
}

impl WorkingMode {
    pub fn to_db(self) -> i64 {
        match self {
            Self::Standard => 0,
            Self::Archive => 1,
        }
    }

    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Standard),
            1 => Some(Self::Archive),
            _ => None,
        }
    }
}

/// Top-level workspace catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    /// Absolute source directory, when the user picked one.
    pub input_path: Option<PathBuf>,
    /// Absolute output directory.
    pub output_path: PathBuf,
    pub working_mode: WorkingMode,
    pub icon_asset_id: Option<AssetId>,
}

impl Workspace {
    /// Derives a workspace id from a creation timestamp (millisecond precision).
    pub fn id_from_timestamp(created_at: DateTime<Utc>) -> WorkspaceId {
        format!(
            "{WORKSPACE_ID_PREFIX}{}",
            created_at.format("%Y%m%d%H%M%S%3f")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{WorkingMode, Workspace};
    use chrono::{TimeZone, Utc};

    #[test]
    fn id_encodes_timestamp_to_milliseconds() {
        let created_at = Utc
            .with_ymd_and_hms(2025, 3, 7, 9, 5, 1)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(42))
            .unwrap();
        assert_eq!(
            Workspace::id_from_timestamp(created_at),
            "workspace_20250307090501042"
        );
    }

    #[test]
    fn working_mode_db_mapping_is_stable() {
        for mode in [WorkingMode::Standard, WorkingMode::Archive] {
            assert_eq!(WorkingMode::from_db(mode.to_db()), Some(mode));
        }
        assert_eq!(WorkingMode::from_db(7), None);
    }
}
