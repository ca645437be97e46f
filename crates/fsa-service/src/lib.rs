//! # fsa-service
//!
//! The asset service ties the content store, the metadata catalog and an
//! optional fallback tier together behind a synchronous call surface.
//!
//! ```text
//! store ──► hash ──► dedup check ──► spool ──► catalog row ──► id
//!                                      │
//!                          mover ──────┘──► sharded tree (.gz)
//!
//! get ──► catalog ──► spool / .gz / legacy ──► normalize ──► record
//!            │ miss
//!            └──► fallback ──► promote via store
//! ```
//!
//! Background loops are not started implicitly: the composition root calls
//! [`AssetService::spawn_background`] and owns the returned
//! [`BackgroundTasks`].

pub mod background;
pub mod fallback;
mod normalize;
pub mod stats;

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use fsa_cas::{hash_to_hex, CasError, ContentHash, ContentStore};
use fsa_catalog::{
    asset_type, content_type_for, AssetMetadata, CatalogEntry, CatalogError, InMemoryCatalog,
    LmdbCatalog, MetadataCatalog,
};
use fsa_config::{
    log_fallback_debug, log_fallback_warn, log_service_debug, log_service_error,
    log_service_warn, CatalogBackend, Config, ConfigError, ServiceConfig,
};
use thiserror::Error;
use uuid::Uuid;

pub use background::BackgroundTasks;
pub use fallback::{FallbackService, LocalFallback};
pub use stats::{ReadStats, StatsSnapshot};

/// Ids longer than this are replaced on store.
pub const MAX_ID_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Content store error: {0}")]
    Cas(#[from] CasError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Catalog refused asset {id}")]
    CatalogRejected { id: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// An asset as handed to and returned from the service.
///
/// `content_hash` is filled in on reads; it is ignored on store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub metadata: AssetMetadata,
    pub content_hash: Option<ContentHash>,
    pub data: Vec<u8>,
}

impl AssetRecord {
    pub fn new(metadata: AssetMetadata, data: impl Into<Vec<u8>>) -> Self {
        Self {
            metadata,
            content_hash: None,
            data: data.into(),
        }
    }
}

/// Open the catalog backend selected by `backend` at `path`.
pub fn open_catalog(
    backend: CatalogBackend,
    path: &Path,
    days_between_access_time_updates: u32,
) -> Result<Arc<dyn MetadataCatalog>> {
    let catalog: Arc<dyn MetadataCatalog> = match backend {
        CatalogBackend::Lmdb => Arc::new(
            LmdbCatalog::open(path)?.with_access_time_refresh(days_between_access_time_updates),
        ),
        CatalogBackend::Memory => Arc::new(InMemoryCatalog::new()),
    };
    Ok(catalog)
}

pub struct AssetService {
    content: ContentStore,
    catalog: Arc<dyn MetadataCatalog>,
    fallback: Option<Arc<dyn FallbackService>>,
    /// Serializes catalog reads so id → {metadata, hash} is read as one unit
    catalog_lock: Mutex<()>,
    stats: Arc<ReadStats>,
    settings: ServiceConfig,
}

impl AssetService {
    pub fn new(content: ContentStore, catalog: Arc<dyn MetadataCatalog>) -> Self {
        Self {
            content,
            catalog,
            fallback: None,
            catalog_lock: Mutex::new(()),
            stats: Arc::new(ReadStats::default()),
            settings: ServiceConfig::default(),
        }
    }

    /// Build the store, catalog and (if enabled) fallback described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = &config.storage;
        let content = ContentStore::open(
            &storage.base_directory,
            &storage.spool_directory,
            storage.layout,
            storage.hash,
        )?
        .with_verify_reads(storage.verify_reads);

        let catalog = open_catalog(
            config.catalog.backend,
            &config.catalog.path,
            config.catalog.days_between_access_time_updates,
        )?;

        let mut service = Self::new(content, catalog).with_settings(config.service.clone());
        if config.fallback.enabled {
            service = service.with_fallback(Arc::new(LocalFallback::from_config(config)?));
        }
        Ok(service)
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackService>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_settings(mut self, settings: ServiceConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.content
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Start the mover and stats loops for this service.
    pub fn spawn_background(&self) -> Result<BackgroundTasks> {
        Ok(BackgroundTasks::spawn(
            self.content.clone(),
            Arc::clone(&self.stats),
            &self.settings,
        )?)
    }

    /// Persist `record` and return the id it was stored under.
    ///
    /// Returns once the bytes are durable in the spool. Overlong name and
    /// description are truncated; a missing or malformed id is replaced with
    /// a fresh UUID.
    pub fn store(&self, record: &AssetRecord) -> Result<String> {
        let mut metadata = record.metadata.clone();
        self.apply_limits(&mut metadata);

        let stored = self.content.put(&record.data)?;

        if !is_valid_id(&metadata.id) {
            let replacement = Uuid::new_v4().to_string();
            log_service_debug!(
                "Replacing malformed asset id",
                id = metadata.id.as_str(),
                replacement = replacement.as_str()
            );
            metadata.id = replacement;
        }

        if !self.catalog.store(&metadata, &stored.hash)? {
            log_service_error!("Catalog refused asset", id = metadata.id.as_str());
            return Err(ServiceError::CatalogRejected { id: metadata.id });
        }

        let hash = hash_to_hex(&stored.hash);
        log_service_debug!(
            "Stored asset",
            id = metadata.id.as_str(),
            hash = hash.as_str(),
            bytes = record.data.len() as u64,
            deduplicated = !stored.was_new
        );
        Ok(metadata.id)
    }

    /// Look up an asset locally, then through the fallback.
    ///
    /// Absent or unreadable content is `Ok(None)`. Only unexpected I/O and
    /// catalog failures are errors.
    pub fn get(&self, id: &str) -> Result<Option<AssetRecord>> {
        let started = Instant::now();
        let result = self.get_uncounted(id);
        self.stats.record_read(started.elapsed());
        result
    }

    fn get_uncounted(&self, id: &str) -> Result<Option<AssetRecord>> {
        let Some(entry) = self.lookup(id)? else {
            self.stats.record_catalog_miss();
            return self.fetch_from_fallback(id);
        };

        let Some(mut data) = self.read_content(id, &entry.hash)? else {
            return Ok(None);
        };
        if entry.metadata.asset_type == asset_type::OBJECT {
            data = normalize::fix_object_payload(data);
        }

        Ok(Some(AssetRecord {
            metadata: entry.metadata,
            content_hash: Some(entry.hash),
            data,
        }))
    }

    /// Metadata only. A catalog miss goes through the fallback like [`get`](Self::get).
    pub fn get_metadata(&self, id: &str) -> Result<Option<AssetMetadata>> {
        if let Some(entry) = self.lookup(id)? {
            return Ok(Some(entry.metadata));
        }
        self.stats.record_catalog_miss();
        Ok(self.fetch_from_fallback(id)?.map(|record| record.metadata))
    }

    pub fn get_data(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(id)?.map(|record| record.data))
    }

    /// Remove the catalog row. Content blobs are shared and stay on disk.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.catalog.delete(id)?;
        log_service_debug!("Deleted asset", id = id, removed = removed);
        Ok(removed)
    }

    /// Catalog existence of each id, in input order.
    pub fn assets_exist(&self, ids: &[String]) -> Result<Vec<bool>> {
        Ok(self.catalog.exists(ids)?)
    }

    pub fn catalog_count(&self) -> Result<u64> {
        Ok(self.catalog.count()?)
    }

    /// Totals since the service was created.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run [`get`](Self::get) on its own thread and hand the result to `callback`.
    pub fn get_with_callback<F>(self: &Arc<Self>, id: &str, callback: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce(String, Result<Option<AssetRecord>>) + Send + 'static,
    {
        let service = Arc::clone(self);
        let id = id.to_string();
        let handle = thread::Builder::new()
            .name("fsa-get".into())
            .spawn(move || {
                let result = service.get(&id);
                callback(id, result);
            })?;
        Ok(handle)
    }

    /// [`get`](Self::get) on tokio's blocking pool.
    #[cfg(feature = "tokio")]
    pub async fn get_async(self: &Arc<Self>, id: &str) -> Result<Option<AssetRecord>> {
        let service = Arc::clone(self);
        let id = id.to_string();
        tokio::task::spawn_blocking(move || service.get(&id))
            .await
            .map_err(|e| ServiceError::Task(e.to_string()))?
    }

    fn lookup(&self, id: &str) -> Result<Option<CatalogEntry>> {
        let _guard = self
            .catalog_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(self.catalog.get(id)?)
    }

    fn read_content(&self, id: &str, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        match self.content.read(hash) {
            Ok(Some(data)) => Ok(Some(data)),
            Ok(None) => {
                self.stats.record_physical_miss();
                let hash = hash_to_hex(hash);
                log_service_warn!(
                    "Catalog entry has no content on disk",
                    id = id,
                    hash = hash.as_str()
                );
                Ok(None)
            }
            Err(e) if e.is_corruption() => {
                self.stats.record_physical_miss();
                let reason = e.to_string();
                log_service_error!("Unreadable content", id = id, error = reason.as_str());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn fetch_from_fallback(&self, id: &str) -> Result<Option<AssetRecord>> {
        let Some(fallback) = &self.fallback else {
            return Ok(None);
        };
        let Some(mut record) = fallback.fetch(id) else {
            log_fallback_debug!("Fallback miss", id = id);
            return Ok(None);
        };

        record.metadata.id = id.to_string();
        record.metadata.content_type = content_type_for(record.metadata.asset_type).to_string();
        self.apply_limits(&mut record.metadata);

        match self.store(&record) {
            Ok(stored_id) => {
                log_fallback_debug!("Promoted asset from fallback", id = stored_id.as_str());
                record.metadata.id = stored_id;
            }
            Err(e) => {
                let reason = e.to_string();
                log_fallback_warn!("Promotion failed", id = id, error = reason.as_str());
            }
        }

        // Hash the raw bytes as stored; callers see them as a local read would
        record.content_hash = Some(self.content.compute_hash(&record.data));
        if record.metadata.asset_type == asset_type::OBJECT {
            record.data = normalize::fix_object_payload(record.data);
        }
        Ok(Some(record))
    }

    fn apply_limits(&self, metadata: &mut AssetMetadata) {
        let id = metadata.id.clone();
        if truncate_chars(&mut metadata.name, self.settings.max_name_len) {
            log_service_warn!(
                "Name truncated",
                id = id.as_str(),
                max = self.settings.max_name_len as u64
            );
        }
        if truncate_chars(&mut metadata.description, self.settings.max_description_len) {
            log_service_warn!(
                "Description truncated",
                id = id.as_str(),
                max = self.settings.max_description_len as u64
            );
        }
    }
}

/// Ids are opaque strings, but empty, nil, whitespace-bearing or overlong ones
/// are replaced.
fn is_valid_id(id: &str) -> bool {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return false;
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    Uuid::parse_str(id).map_or(true, |uuid| !uuid.is_nil())
}

/// Cut `s` to at most `max` characters. Returns whether anything was removed.
fn truncate_chars(s: &mut String, max: usize) -> bool {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => {
            s.truncate(byte_idx);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_validation() {
        assert!(is_valid_id("a1"));
        assert!(is_valid_id("5f0c2a4e-1b7d-4c1e-9a55-0f6b2c3d4e5f"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("00000000-0000-0000-0000-000000000000"));
        assert!(!is_valid_id("has space"));
        assert!(!is_valid_id("tab\there"));
        assert!(!is_valid_id(&"x".repeat(MAX_ID_LEN + 1)));
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        let mut s = "héllo wörld".to_string();
        assert!(truncate_chars(&mut s, 4));
        assert_eq!(s, "héll");

        let mut short = "abc".to_string();
        assert!(!truncate_chars(&mut short, 3));
        assert_eq!(short, "abc");

        let mut emoji = "🦀🦀🦀".to_string();
        assert!(truncate_chars(&mut emoji, 1));
        assert_eq!(emoji, "🦀");
    }
}
