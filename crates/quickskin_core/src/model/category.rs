//! Category model.
//!
//! # Responsibility
//! - Define the category record and its id/tint value types.
//! - Allocate system-controlled category ids.
//!
//! # Invariants
//! - A category id is a safe SQL identifier; it names the item table.
//! - `DEFAULT_CATEGORY_ID` is fixed and always provisioned on first access.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Category identifier; also the name of the category's item table.
pub type CategoryId = String;

/// Well-known id of the "uncategorized" bucket.
pub const DEFAULT_CATEGORY_ID: &str = "Item_Default";

/// Display name used when the default category is provisioned.
pub const DEFAULT_CATEGORY_NAME: &str = "Uncategorized";

const CATEGORY_ID_PREFIX: &str = "category_";

/// Icon tint color (ARGB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tint {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Tint {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 0xff, r, g, b }
    }

    /// Parses `#rrggbb` or `#aarrggbb` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.trim().strip_prefix('#')?;
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |index: usize| u8::from_str_radix(&hex[index..index + 2], 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self {
                a: byte(0)?,
                r: byte(2)?,
                g: byte(4)?,
                b: byte(6)?,
            }),
            _ => None,
        }
    }
}

impl Display for Tint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.a, self.r, self.g, self.b)
    }
}

/// User-defined grouping of release items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Key into the static icon catalog.
    pub icon_key: Option<String>,
    pub icon_tint: Option<Tint>,
    pub description: Option<String>,
}

impl Category {
    /// Builds the default category record.
    pub fn default_category() -> Self {
        Self {
            id: DEFAULT_CATEGORY_ID.to_string(),
            name: DEFAULT_CATEGORY_NAME.to_string(),
            icon_key: None,
            icon_tint: None,
            description: None,
        }
    }

    /// Allocates a new category id (`category_<hex>`).
    pub fn generate_id() -> CategoryId {
        format!("{CATEGORY_ID_PREFIX}{}", Uuid::new_v4().simple())
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_CATEGORY_ID
    }

    /// Item table name owned by this category.
    pub fn item_table(&self) -> &str {
        &self.id
    }
}

/// User-supplied fields for a new category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub icon_key: Option<String>,
    /// `#rrggbb` / `#aarrggbb`.
    pub icon_tint: Option<String>,
    pub description: Option<String>,
}

impl NewCategory {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
