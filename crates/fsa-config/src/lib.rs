//! # fsa-config
//!
//! Configuration management for fsassets.
//!
//! Loads configuration from:
//! 1. `~/.fsassets/config.toml` (global)
//! 2. `.fsassets/config.toml` (project-local, overrides global key by key)
//! 3. Environment variables (highest priority)
//!
//! There is no process-wide config instance: the binary that composes the
//! service loads a [`Config`] and passes it down.

pub mod logging;
pub mod testing;

use std::path::{Path, PathBuf};

use fsa_cas::{HashAlgorithm, ShardLayout};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use logging::{init_logging, LogLevel};

/// Project-local config file, relative to the working directory
pub const PROJECT_CONFIG: &str = ".fsassets/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub fallback: FallbackConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                layers.push(global_path);
            }
        }
        let project_path = PathBuf::from(PROJECT_CONFIG);
        if project_path.exists() {
            layers.push(project_path);
        }

        Self::finish(Self::from_layers(&layers)?)
    }

    /// Load a single explicit file, then apply environment overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::finish(Self::from_layers(&[path.as_ref().to_path_buf()])?)
    }

    /// Global config path: ~/.fsassets/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".fsassets/config.toml"))
    }

    /// Parse and deep-merge TOML files, later files winning key by key.
    pub fn from_layers(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        for path in paths {
            debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)?;
            let layer: toml::Table = toml::from_str(&contents)?;
            merge_tables(&mut merged, layer);
        }
        Ok(toml::Value::Table(merged).try_into::<Config>()?)
    }

    fn finish(mut config: Config) -> Result<Self, ConfigError> {
        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FSASSETS_BASE_DIR") {
            self.storage.base_directory = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("FSASSETS_SPOOL_DIR") {
            self.storage.spool_directory = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("FSASSETS_CATALOG") {
            self.catalog.path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("FSASSETS_LOG") {
            if let Ok(level) = level.parse() {
                self.logging.level = level;
            }
        }
    }

    fn expand_paths(&mut self) {
        for path in [
            &mut self.storage.base_directory,
            &mut self.storage.spool_directory,
            &mut self.catalog.path,
            &mut self.fallback.base_directory,
            &mut self.fallback.spool_directory,
            &mut self.fallback.catalog_path,
        ] {
            *path = expand_home(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.mover_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "service.mover_interval_ms must be positive".into(),
            ));
        }
        if self.service.stats_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "service.stats_interval_secs must be positive".into(),
            ));
        }
        if self.fallback.enabled && self.fallback.base_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "fallback.base_directory is required when the fallback is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the sharded tree
    pub base_directory: PathBuf,
    /// Spool root (must be on the same filesystem as its `spool/` staging dir)
    pub spool_directory: PathBuf,
    /// `core` or `osgrid`
    pub layout: ShardLayout,
    /// `sha256` or `blake3`
    pub hash: HashAlgorithm,
    /// Re-hash blobs on read
    pub verify_reads: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from("~/.fsassets/data"),
            spool_directory: PathBuf::from("~/.fsassets/spool"),
            layout: ShardLayout::Core,
            hash: HashAlgorithm::Sha256,
            verify_reads: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    #[default]
    Lmdb,
    Memory,
}

/// Catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub backend: CatalogBackend,
    /// LMDB environment directory
    pub path: PathBuf,
    /// Refresh access time on read once older than this (0 = never)
    pub days_between_access_time_updates: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: CatalogBackend::Lmdb,
            path: PathBuf::from("~/.fsassets/catalog"),
            days_between_access_time_updates: 0,
        }
    }
}

/// Secondary store consulted on local misses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub base_directory: PathBuf,
    pub spool_directory: PathBuf,
    pub catalog_path: PathBuf,
}

/// Background loops and ingestion limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub mover_interval_ms: u64,
    pub stats_interval_secs: u64,
    pub show_stats: bool,
    /// Longer names are truncated on store
    pub max_name_len: usize,
    /// Longer descriptions are truncated on store
    pub max_description_len: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mover_interval_ms: 1000,
            stats_interval_secs: 60,
            show_stats: true,
            max_name_len: 64,
            max_description_len: 64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.layout, ShardLayout::Core);
        assert_eq!(config.storage.hash, HashAlgorithm::Sha256);
        assert_eq!(config.service.mover_interval_ms, 1000);
        assert_eq!(config.service.stats_interval_secs, 60);
        assert!(!config.fallback.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[service]"));
        assert!(toml_str.contains("layout = \"core\""));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.storage.base_directory, config.storage.base_directory);
        assert_eq!(parsed.service.max_name_len, 64);
    }

    #[test]
    fn test_merge_tables_is_key_by_key() {
        let mut base: toml::Table = toml::from_str(
            r#"
[storage]
layout = "osgrid"
verify_reads = false
"#,
        )
        .unwrap();
        let overlay: toml::Table = toml::from_str(
            r#"
[storage]
layout = "core"
"#,
        )
        .unwrap();

        merge_tables(&mut base, overlay);
        let config: Config = toml::Value::Table(base).try_into().unwrap();
        assert_eq!(config.storage.layout, ShardLayout::Core);
        assert!(!config.storage.verify_reads);
    }

    #[test]
    fn test_expand_home() {
        let plain = expand_home(Path::new("/srv/assets"));
        assert_eq!(plain, PathBuf::from("/srv/assets"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/assets")), home.join("assets"));
        }
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.service.mover_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_requires_fallback_directory() {
        let mut config = Config::default();
        config.fallback.enabled = true;
        assert!(config.validate().is_err());
        config.fallback.base_directory = PathBuf::from("/srv/fallback");
        assert!(config.validate().is_ok());
    }
}
