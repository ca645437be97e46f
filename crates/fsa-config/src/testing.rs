//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - Temporary shard, spool and catalog roots
//! - A matching secondary store for fallback tests
//! - A ready-made [`Config`](crate::Config) pointing at all of them
//!
//! # Usage
//!
//! ```ignore
//! use fsa_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     let config = env.config();
//!     // config.storage.base_directory etc. are all isolated
//! }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use tempfile::TempDir;

use crate::{CatalogBackend, Config};

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated set of store directories, removed on drop
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    pub base_dir: PathBuf,
    pub spool_dir: PathBuf,
    pub catalog_dir: PathBuf,
    /// Roots for a second store used as the fallback tier
    pub fallback_base_dir: PathBuf,
    pub fallback_spool_dir: PathBuf,
    pub fallback_catalog_dir: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let env = Self {
            base_dir: root.join("data"),
            spool_dir: root.join("spool"),
            catalog_dir: root.join("catalog"),
            fallback_base_dir: root.join("fallback").join("data"),
            fallback_spool_dir: root.join("fallback").join("spool"),
            fallback_catalog_dir: root.join("fallback").join("catalog"),
            _temp_dir: temp_dir,
            test_id,
        };

        for dir in [&env.base_dir, &env.spool_dir, &env.catalog_dir] {
            std::fs::create_dir_all(dir)?;
        }

        Ok(env)
    }

    pub fn root(&self) -> PathBuf {
        self._temp_dir.path().to_path_buf()
    }

    /// Config for the primary store, fallback disabled, fast mover.
    pub fn config(&self) -> Config {
        let mut cfg = Config::default();
        cfg.storage.base_directory = self.base_dir.clone();
        cfg.storage.spool_directory = self.spool_dir.clone();
        cfg.catalog.backend = CatalogBackend::Lmdb;
        cfg.catalog.path = self.catalog_dir.clone();
        cfg.service.mover_interval_ms = 50;
        cfg.service.stats_interval_secs = 1;
        cfg
    }

    /// Config for the primary store with the secondary store as fallback.
    pub fn config_with_fallback(&self) -> Config {
        let mut cfg = self.config();
        cfg.fallback.enabled = true;
        cfg.fallback.base_directory = self.fallback_base_dir.clone();
        cfg.fallback.spool_directory = self.fallback_spool_dir.clone();
        cfg.fallback.catalog_path = self.fallback_catalog_dir.clone();
        cfg
    }

    /// Config that opens the secondary store as a primary store.
    pub fn fallback_store_config(&self) -> Config {
        let mut cfg = self.config();
        cfg.storage.base_directory = self.fallback_base_dir.clone();
        cfg.storage.spool_directory = self.fallback_spool_dir.clone();
        cfg.catalog.path = self.fallback_catalog_dir.clone();
        cfg
    }

    /// Write `config` as TOML into the environment and return its path.
    pub fn write_config(&self, config: &Config) -> anyhow::Result<PathBuf> {
        let path = self.root().join(format!("config-{}.toml", self.test_id));
        std::fs::write(&path, toml::to_string_pretty(config)?)?;
        Ok(path)
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
