//! The permanent hash-sharded tree, gzip-compressed at rest.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{instrument, warn};
use walkdir::WalkDir;

use crate::{hash_to_hex, read_if_present, CasError, ContentHash, Result, ShardLayout};

/// Extension of compressed shard files.
pub const COMPRESSED_EXTENSION: &str = "gz";

#[derive(Debug, Clone)]
pub struct ShardedStore {
    root: PathBuf,
    layout: ShardLayout,
}

impl ShardedStore {
    /// Open a sharded tree at `root`, creating the root if needed.
    pub fn open<P: AsRef<Path>>(root: P, layout: ShardLayout) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root, layout })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> ShardLayout {
        self.layout
    }

    pub fn shard_dir(&self, hash: &ContentHash) -> PathBuf {
        self.layout.shard_dir(&self.root, &hash_to_hex(hash))
    }

    pub fn compressed_path(&self, hash: &ContentHash) -> PathBuf {
        self.shard_dir(hash)
            .join(format!("{}.{}", hash_to_hex(hash), COMPRESSED_EXTENSION))
    }

    /// Uncompressed file written by older deployments.
    pub fn legacy_path(&self, hash: &ContentHash) -> PathBuf {
        self.shard_dir(hash).join(hash_to_hex(hash))
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.compressed_path(hash).is_file() || self.legacy_path(hash).is_file()
    }

    /// Read and decompress a blob, falling back to the legacy uncompressed file.
    #[instrument(skip(self), fields(hash = %hash_to_hex(hash)), level = "debug")]
    pub fn read(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        if let Some(compressed) = read_if_present(&self.compressed_path(hash))? {
            let mut data = Vec::new();
            match GzDecoder::new(compressed.as_slice()).read_to_end(&mut data) {
                Ok(_) => return Ok(Some(data)),
                Err(e) => {
                    // A readable legacy copy still answers for this hash
                    if let Some(legacy) = read_if_present(&self.legacy_path(hash))? {
                        warn!(
                            hash = %hash_to_hex(hash),
                            error = %e,
                            "Undecodable .gz, served legacy copy"
                        );
                        return Ok(Some(legacy));
                    }
                    return Err(CasError::Corrupt {
                        hash: hash_to_hex(hash),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(read_if_present(&self.legacy_path(hash))?)
    }

    /// Compress `data` into the shard file for `hash`.
    ///
    /// The shard directory must already exist. The file appears under its
    /// final name only once fully written. Returns `false` if a compressed
    /// file was already there (nothing written).
    pub(crate) fn write_compressed(&self, hash: &ContentHash, data: &[u8]) -> Result<bool> {
        let dest = self.compressed_path(hash);
        if dest.is_file() {
            return Ok(false);
        }

        let dir = self.shard_dir(hash);
        let temp = tempfile::Builder::new().suffix(".tmp").tempfile_in(&dir)?;
        let mut encoder = GzEncoder::new(temp, Compression::default());
        encoder.write_all(data)?;
        let temp = encoder.finish()?;
        temp.as_file().sync_all()?;

        match temp.persist_noclobber(&dest) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(CasError::Io(e.error)),
        }
    }

    /// Walk the whole tree and tally blobs.
    pub fn stats(&self) -> Result<ShardStats> {
        let mut stats = ShardStats::default();

        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| CasError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            // In-flight mover output
            if name.ends_with(".tmp") {
                continue;
            }

            let size = entry.metadata().map_err(|e| CasError::Io(e.into()))?.len();
            if name.ends_with(".gz") {
                stats.compressed_blobs += 1;
            } else {
                stats.legacy_blobs += 1;
            }
            stats.total_bytes += size;
        }

        Ok(stats)
    }
}

/// On-disk statistics for the sharded tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// `<hash>.gz` files
    pub compressed_blobs: u64,
    /// Uncompressed files from older deployments
    pub legacy_blobs: u64,
    /// Bytes on disk (compressed size for `.gz`)
    pub total_bytes: u64,
}

impl ShardStats {
    pub fn blob_count(&self) -> u64 {
        self.compressed_blobs + self.legacy_blobs
    }

    pub fn avg_blob_size(&self) -> u64 {
        match self.blob_count() {
            0 => 0,
            n => self.total_bytes / n,
        }
    }
}
