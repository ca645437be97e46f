//! Secondary asset sources consulted on a local miss.

use std::path::{Path, PathBuf};

use fsa_cas::ContentStore;
use fsa_config::{log_fallback_warn, Config};

use crate::{open_catalog, AssetRecord, AssetService, Result};

/// A source of assets the local store does not have.
///
/// Implementations own their timeouts; a failed fetch is just `None`.
pub trait FallbackService: Send + Sync {
    fn fetch(&self, id: &str) -> Option<AssetRecord>;
}

/// Another service can act as a fallback; it chains to its own fallback in turn.
impl FallbackService for AssetService {
    fn fetch(&self, id: &str) -> Option<AssetRecord> {
        match self.get(id) {
            Ok(record) => record,
            Err(e) => {
                let reason = e.to_string();
                log_fallback_warn!("Fallback read failed", id = id, error = reason.as_str());
                None
            }
        }
    }
}

/// A second on-disk store described by the `[fallback]` config section.
pub struct LocalFallback {
    service: AssetService,
}

impl LocalFallback {
    /// Open the fallback store. Empty spool and catalog paths default to
    /// `spool` and `catalog` under the fallback base directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fallback = &config.fallback;
        let base = fallback.base_directory.clone();
        let spool = non_empty_or(&fallback.spool_directory, base.join("spool"));
        let catalog_path = non_empty_or(&fallback.catalog_path, base.join("catalog"));

        let content = ContentStore::open(
            &base,
            &spool,
            config.storage.layout,
            config.storage.hash,
        )?
        .with_verify_reads(config.storage.verify_reads);
        let catalog = open_catalog(
            config.catalog.backend,
            &catalog_path,
            config.catalog.days_between_access_time_updates,
        )?;

        Ok(Self {
            service: AssetService::new(content, catalog).with_settings(config.service.clone()),
        })
    }

    pub fn service(&self) -> &AssetService {
        &self.service
    }
}

impl FallbackService for LocalFallback {
    fn fetch(&self, id: &str) -> Option<AssetRecord> {
        self.service.fetch(id)
    }
}

fn non_empty_or(path: &Path, default: PathBuf) -> PathBuf {
    if path.as_os_str().is_empty() {
        default
    } else {
        path.to_path_buf()
    }
}
