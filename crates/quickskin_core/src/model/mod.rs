//! Domain records persisted by the core.
//!
//! # Responsibility
//! - Define workspace/category/release-item records and asset identifiers.
//! - Keep storage-agnostic validation helpers next to the data they check.
//!
//! # Invariants
//! - Category ids double as item-table names and are always safe identifiers.
//! - Asset ids are opaque; only the asset cache interprets them.

pub mod asset;
pub mod category;
pub mod release_item;
pub mod workspace;

pub use asset::AssetId;
pub use category::{Category, CategoryId, NewCategory, Tint, DEFAULT_CATEGORY_ID};
pub use release_item::ReleaseItem;
pub use workspace::{WorkingMode, Workspace, WorkspaceId};
