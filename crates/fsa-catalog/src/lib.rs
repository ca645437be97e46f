//! # fsa-catalog
//!
//! The metadata catalog maps an asset id to its descriptive metadata and the
//! content hash of its bytes. The bytes themselves live in `fsa-cas`.
//!
//! ## Backends
//!
//! - `LmdbCatalog`: heed/LMDB, persistent, crash-safe
//! - `InMemoryCatalog`: DashMap, for tests and throwaway stores
//!
//! The asset service only sees the [`MetadataCatalog`] trait, so any other
//! backend (e.g. a SQL database) can be injected instead.

pub mod lmdb;
pub mod memory;

pub use lmdb::LmdbCatalog;
pub use memory::InMemoryCatalog;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fsa_cas::ContentHash;

/// Catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Well-known asset type codes.
pub mod asset_type {
    pub const TEXTURE: i8 = 0;
    pub const SOUND: i8 = 1;
    pub const CALLING_CARD: i8 = 2;
    pub const LANDMARK: i8 = 3;
    pub const CLOTHING: i8 = 5;
    pub const OBJECT: i8 = 6;
    pub const NOTECARD: i8 = 7;
    pub const FOLDER: i8 = 8;
    pub const LSL_TEXT: i8 = 10;
    pub const LSL_BYTECODE: i8 = 11;
    pub const TEXTURE_TGA: i8 = 12;
    pub const BODYPART: i8 = 13;
    pub const SOUND_WAV: i8 = 17;
    pub const IMAGE_TGA: i8 = 18;
    pub const IMAGE_JPEG: i8 = 19;
    pub const ANIMATION: i8 = 20;
    pub const GESTURE: i8 = 21;
    pub const SIMSTATE: i8 = 22;
    pub const LINK: i8 = 24;
    pub const LINK_FOLDER: i8 = 25;
    pub const MESH: i8 = 49;
}

/// MIME content type for an asset type code.
pub fn content_type_for(asset_type: i8) -> &'static str {
    match asset_type {
        asset_type::TEXTURE => "image/x-j2c",
        asset_type::SOUND => "audio/ogg",
        asset_type::CALLING_CARD => "application/vnd.ll.callingcard",
        asset_type::LANDMARK => "application/vnd.ll.landmark",
        asset_type::CLOTHING => "application/vnd.ll.clothing",
        asset_type::OBJECT => "application/vnd.ll.primitive",
        asset_type::NOTECARD => "application/vnd.ll.notecard",
        asset_type::FOLDER => "application/vnd.ll.folder",
        asset_type::LSL_TEXT => "application/vnd.ll.lsltext",
        asset_type::LSL_BYTECODE => "application/vnd.ll.lslbyte",
        asset_type::TEXTURE_TGA | asset_type::IMAGE_TGA => "image/tga",
        asset_type::BODYPART => "application/vnd.ll.bodypart",
        asset_type::SOUND_WAV => "audio/x-wav",
        asset_type::IMAGE_JPEG => "image/jpeg",
        asset_type::ANIMATION => "application/vnd.ll.animation",
        asset_type::GESTURE => "application/vnd.ll.gesture",
        asset_type::SIMSTATE => "application/x-metaverse-simstate",
        asset_type::LINK => "application/vnd.ll.link",
        asset_type::LINK_FOLDER => "application/vnd.ll.linkfolder",
        asset_type::MESH => "application/vnd.ll.mesh",
        _ => "application/octet-stream",
    }
}

/// Descriptive fields of an asset. Never contains the asset bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub asset_type: i8,
    pub content_type: String,
    pub flags: u32,
    pub creation_date: DateTime<Utc>,
}

impl AssetMetadata {
    /// Metadata with empty name/description and the type's default content type.
    pub fn new(id: impl Into<String>, asset_type: i8) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            asset_type,
            content_type: content_type_for(asset_type).to_string(),
            flags: 0,
            creation_date: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A catalog row as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub metadata: AssetMetadata,
    pub hash: ContentHash,
}

/// Id → {metadata, content hash} index.
///
/// Implementations handle their own internal concurrency; the asset service
/// additionally serializes `get` calls.
pub trait MetadataCatalog: Send + Sync {
    fn get(&self, id: &str) -> CatalogResult<Option<CatalogEntry>>;

    /// Insert or replace the row for `metadata.id`. Returns `false` if the
    /// backend refused the row.
    fn store(&self, metadata: &AssetMetadata, hash: &ContentHash) -> CatalogResult<bool>;

    /// Existence of each id, in input order.
    fn exists(&self, ids: &[String]) -> CatalogResult<Vec<bool>> {
        ids.iter()
            .map(|id| Ok(self.get(id)?.is_some()))
            .collect()
    }

    /// Remove the row. Returns whether a row existed.
    fn delete(&self, id: &str) -> CatalogResult<bool>;

    fn count(&self) -> CatalogResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_table() {
        assert_eq!(content_type_for(asset_type::TEXTURE), "image/x-j2c");
        assert_eq!(content_type_for(asset_type::OBJECT), "application/vnd.ll.primitive");
        assert_eq!(content_type_for(asset_type::IMAGE_TGA), "image/tga");
        assert_eq!(content_type_for(-1), "application/octet-stream");
        assert_eq!(content_type_for(99), "application/octet-stream");
    }

    #[test]
    fn test_metadata_defaults_content_type() {
        let meta = AssetMetadata::new("abc", asset_type::SOUND).with_name("ding");
        assert_eq!(meta.content_type, "audio/ogg");
        assert_eq!(meta.name, "ding");
        assert!(meta.description.is_empty());
    }
}
