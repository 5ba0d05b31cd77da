//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and asset cache calls into use-case level APIs.
//! - Validate user input before any mutation.

pub mod category_store;
pub mod workspace_registry;

pub use category_store::{CategoryError, CategoryResult, CategoryStore};
pub use workspace_registry::{NewWorkspace, RegistryError, RegistryResult, WorkspaceRegistry};
