//! LMDB-backed catalog for persistent, crash-safe id → metadata mapping.
//!
//! One `assets` database keyed by asset id. Each row also carries the last
//! access time, refreshed lazily on reads.

use std::path::Path;

use chrono::Utc;
use heed::types::{DecodeIgnore, SerdeBincode, Str};
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AssetMetadata, CatalogEntry, CatalogResult, ContentHash, MetadataCatalog};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogRow {
    metadata: AssetMetadata,
    hash: ContentHash,
    /// Unix seconds
    access_time: i64,
}

pub struct LmdbCatalog {
    env: Env,
    assets: Database<Str, SerdeBincode<CatalogRow>>,
    /// Minimum age before a read rewrites `access_time`; 0 disables.
    access_refresh_secs: i64,
}

impl LmdbCatalog {
    /// Default LMDB map size: 1GB (expandable)
    const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;

    /// Maximum readers
    const MAX_READERS: u32 = 128;

    /// Open or create a catalog in the directory at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(Self::DEFAULT_MAP_SIZE)
                .max_readers(Self::MAX_READERS)
                .max_dbs(1)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let assets = env.create_database(&mut wtxn, Some("assets"))?;
        wtxn.commit()?;

        debug!("Opened LMDB catalog at {:?}", path);

        Ok(Self {
            env,
            assets,
            access_refresh_secs: 0,
        })
    }

    /// Refresh a row's access time on read once it is older than `days`.
    pub fn with_access_time_refresh(mut self, days: u32) -> Self {
        self.access_refresh_secs = i64::from(days) * SECONDS_PER_DAY;
        self
    }

    /// Last recorded access time (unix seconds) of an asset.
    pub fn last_access(&self, id: &str) -> CatalogResult<Option<i64>> {
        let rtxn = self.env.read_txn()?;
        Ok(self.assets.get(&rtxn, id)?.map(|row| row.access_time))
    }

    /// Flush LMDB to disk
    pub fn sync(&self) -> CatalogResult<()> {
        self.env.force_sync()?;
        Ok(())
    }

    fn touch(&self, id: &str, now: i64) -> CatalogResult<()> {
        let mut wtxn = self.env.write_txn()?;
        if let Some(mut row) = self.assets.get(&wtxn, id)? {
            row.access_time = now;
            self.assets.put(&mut wtxn, id, &row)?;
        }
        wtxn.commit()?;
        Ok(())
    }

    #[cfg(test)]
    fn set_access_time(&self, id: &str, at: i64) -> CatalogResult<()> {
        self.touch(id, at)
    }
}

impl MetadataCatalog for LmdbCatalog {
    fn get(&self, id: &str) -> CatalogResult<Option<CatalogEntry>> {
        let row = {
            let rtxn = self.env.read_txn()?;
            self.assets.get(&rtxn, id)?
        };
        let Some(row) = row else {
            return Ok(None);
        };

        if self.access_refresh_secs > 0 {
            let now = Utc::now().timestamp();
            if now - row.access_time > self.access_refresh_secs {
                self.touch(id, now)?;
            }
        }

        Ok(Some(CatalogEntry {
            metadata: row.metadata,
            hash: row.hash,
        }))
    }

    fn store(&self, metadata: &AssetMetadata, hash: &ContentHash) -> CatalogResult<bool> {
        let row = CatalogRow {
            metadata: metadata.clone(),
            hash: *hash,
            access_time: Utc::now().timestamp(),
        };

        let mut wtxn = self.env.write_txn()?;
        self.assets.put(&mut wtxn, &metadata.id, &row)?;
        wtxn.commit()?;
        Ok(true)
    }

    fn exists(&self, ids: &[String]) -> CatalogResult<Vec<bool>> {
        let rtxn = self.env.read_txn()?;
        let keys_only = self.assets.remap_data_type::<DecodeIgnore>();
        ids.iter()
            .map(|id| Ok(keys_only.get(&rtxn, id)?.is_some()))
            .collect()
    }

    fn delete(&self, id: &str) -> CatalogResult<bool> {
        let mut wtxn = self.env.write_txn()?;
        let existed = self.assets.delete(&mut wtxn, id)?;
        wtxn.commit()?;
        Ok(existed)
    }

    fn count(&self) -> CatalogResult<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.assets.len(&rtxn)?)
    }
}
