//! Image asset storage and the two-tier asset cache.
//!
//! # Responsibility
//! - Persist encoded image bytes in the shared blob table.
//! - Cache decoded images in memory and resolve reads without blocking.
//!
//! # Invariants
//! - Writes go to the blob table before the in-memory tier.
//! - Deletes remove the blob row before evicting the in-memory entry.
//! - Undecodable or unreadable blobs resolve as absent, never as errors.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod blob_store;
pub mod cache;
pub mod codec;

pub use blob_store::{BlobStore, SqliteBlobStore, BLOB_TABLE};
pub use cache::{AssetCache, AssetObserver, AssetState, Placeholders, Resolution};
pub use codec::{AssetCodecError, ImageCodec, PngCodec};

pub type AssetResult<T> = Result<T, AssetError>;

/// Failure of an asset write or delete.
#[derive(Debug)]
pub enum AssetError {
    Db(DbError),
    Codec(AssetCodecError),
}

impl Display for AssetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Codec(err) => Some(err),
        }
    }
}

impl From<DbError> for AssetError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<AssetCodecError> for AssetError {
    fn from(value: AssetCodecError) -> Self {
        Self::Codec(value)
    }
}
