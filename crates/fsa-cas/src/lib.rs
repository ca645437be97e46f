//! # fsa-cas
//!
//! Content-addressed blob storage for fsassets.
//!
//! Blobs are addressed purely by a 32-byte content digest (SHA-256 by default,
//! BLAKE3 optionally). Writes land in a flat spool directory first and are
//! migrated by the shard mover into a gzip-compressed, hash-sharded tree.
//!
//! ## Directory Layout
//!
//! ```text
//! <spool>/
//! ├── spool/                      # staging area for in-flight temp files
//! └── 2cf24dba...9824.asset       # durably written, not yet sharded
//!
//! <base>/                         # "core" layout: [0:2]/[2:4]/[4:6]/[6:10]
//! └── 2c/
//!     └── f2/
//!         └── 4d/
//!             └── ba5f/
//!                 ├── 2cf24dba...9824.gz   # compressed blob
//!                 └── 2cf24dba...9824      # legacy uncompressed (read-only)
//! ```
//!
//! The "osgrid" layout uses `[0:3]/[3:6]` instead.

mod layout;
mod mover;
mod shard;
mod spool;

pub use layout::ShardLayout;
pub use mover::{clear_path_collision, sweep, SweepReport};
pub use shard::{ShardStats, ShardedStore, COMPRESSED_EXTENSION};
pub use spool::{Spool, SpoolEntry, SPOOL_EXTENSION};

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

/// Content digest (32 bytes for every supported algorithm)
pub type ContentHash = [u8; 32];

/// Errors that can occur during CAS operations
#[derive(Error, Debug)]
pub enum CasError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt blob {hash}: {reason}")]
    Corrupt { hash: String, reason: String },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

impl CasError {
    /// True when the bytes on disk exist but cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(self, CasError::Corrupt { .. } | CasError::HashMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, CasError>;

/// Digest used to address content.
///
/// Both algorithms produce 32 bytes, so the shard layouts are identical.
/// `Sha256` is what existing stores on disk were written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    #[inline]
    pub fn digest(self, data: &[u8]) -> ContentHash {
        match self {
            HashAlgorithm::Sha256 => {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&Sha256::digest(data));
                hash
            }
            HashAlgorithm::Blake3 => *blake3::hash(data).as_bytes(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }
}

/// Convert a hash to its lowercase hex representation.
#[inline]
pub fn hash_to_hex(hash: &ContentHash) -> String {
    hex::encode(hash)
}

/// Parse a 64-character hex string into a hash.
pub fn hex_to_hash(s: &str) -> Option<ContentHash> {
    if s.len() != 64 {
        return None;
    }
    let mut hash = [0u8; 32];
    hex::decode_to_slice(s, &mut hash).ok()?;
    Some(hash)
}

/// Read a whole file, mapping "does not exist" to `None`.
///
/// The mover may delete a spool file between a caller's existence check and
/// its read, so callers probe by reading rather than by `exists()`.
pub(crate) fn read_if_present(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Result of placing bytes into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stored {
    pub hash: ContentHash,
    /// False when the content was already present (deduplicated).
    pub was_new: bool,
}

/// Spool plus sharded tree, addressed by one hash algorithm.
///
/// Cheap to clone: only paths and flags are held.
#[derive(Debug, Clone)]
pub struct ContentStore {
    spool: Spool,
    shards: ShardedStore,
    algorithm: HashAlgorithm,
    verify_reads: bool,
}

impl ContentStore {
    /// Open (creating if needed) a store over the given shard root and spool root.
    pub fn open<B: AsRef<Path>, S: AsRef<Path>>(
        base: B,
        spool: S,
        layout: ShardLayout,
        algorithm: HashAlgorithm,
    ) -> Result<Self> {
        Ok(Self {
            spool: Spool::open(spool)?,
            shards: ShardedStore::open(base, layout)?,
            algorithm,
            verify_reads: true,
        })
    }

    /// Re-hash bytes on every read and reject mismatches as corruption.
    pub fn with_verify_reads(mut self, verify: bool) -> Self {
        self.verify_reads = verify;
        self
    }

    pub fn spool(&self) -> &Spool {
        &self.spool
    }

    pub fn shards(&self) -> &ShardedStore {
        &self.shards
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[inline]
    pub fn compute_hash(&self, data: &[u8]) -> ContentHash {
        self.algorithm.digest(data)
    }

    /// Whether a blob for `hash` is spooled or sharded.
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.spool.contains(hash) || self.shards.contains(hash)
    }

    /// Hash `data` and spool it unless a blob with that hash already exists.
    ///
    /// Returns once the bytes are durable in the spool; sharding happens later.
    #[instrument(skip(self, data), fields(len = data.len()), level = "debug")]
    pub fn put(&self, data: &[u8]) -> Result<Stored> {
        let hash = self.compute_hash(data);
        if self.contains(&hash) {
            return Ok(Stored {
                hash,
                was_new: false,
            });
        }
        self.spool.write(&hash, data)?;
        Ok(Stored {
            hash,
            was_new: true,
        })
    }

    /// Read a blob from the spool, then the compressed shard, then the legacy
    /// uncompressed shard file.
    #[instrument(skip(self), fields(hash = %hash_to_hex(hash)), level = "debug")]
    pub fn read(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        let data = match self.spool.read(hash)? {
            Some(data) => data,
            None => match self.shards.read(hash)? {
                Some(data) => data,
                None => return Ok(None),
            },
        };

        if self.verify_reads {
            let actual = self.compute_hash(&data);
            if actual != *hash {
                return Err(CasError::HashMismatch {
                    expected: hash_to_hex(hash),
                    actual: hash_to_hex(&actual),
                });
            }
        }

        Ok(Some(data))
    }

    /// Run one mover pass over the spool.
    pub fn sweep(&self) -> SweepReport {
        mover::sweep(&self.spool, &self.shards)
    }
}
