//! Spool buffer: the synchronous, crash-safe write path.
//!
//! A spool entry `<hex>.asset` exists only after its bytes were fully written
//! and fsynced in `spool/` and atomically renamed into the spool root.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{hash_to_hex, hex_to_hash, read_if_present, ContentHash, Result};

/// Extension of finished spool entries.
pub const SPOOL_EXTENSION: &str = "asset";

/// Subdirectory holding temp files before the rename.
const STAGING_DIR: &str = "spool";

/// A finished file found in the spool root.
#[derive(Debug, Clone)]
pub struct SpoolEntry {
    pub path: PathBuf,
    /// `None` when the file stem is not a valid hex digest.
    pub hash: Option<ContentHash>,
}

#[derive(Debug, Clone)]
pub struct Spool {
    root: PathBuf,
}

impl Spool {
    /// Open the spool, creating the root and staging directories.
    ///
    /// Temp files left in staging by an interrupted write are removed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(STAGING_DIR))?;
        let spool = Self { root };
        spool.clear_stale_staging();
        Ok(spool)
    }

    /// Best effort: failures are logged and the spool stays usable.
    fn clear_stale_staging(&self) {
        let dir = self.staging_dir();
        let dirents = match fs::read_dir(&dir) {
            Ok(dirents) => dirents,
            Err(e) => {
                warn!(staging = %dir.display(), error = %e, "Failed to list staging directory");
                return;
            }
        };

        for dirent in dirents.flatten() {
            let path = dirent.path();
            if path.extension().map_or(true, |ext| ext != "tmp") {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed stale staging file"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staging file"),
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    pub fn entry_path(&self, hash: &ContentHash) -> PathBuf {
        self.root
            .join(format!("{}.{}", hash_to_hex(hash), SPOOL_EXTENSION))
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entry_path(hash).is_file()
    }

    /// Durably write `data` as the spool entry for `hash`.
    ///
    /// Concurrent writers of the same hash each use their own temp file; the
    /// last rename wins and every rename carries identical bytes.
    pub fn write(&self, hash: &ContentHash, data: &[u8]) -> Result<PathBuf> {
        let mut temp = tempfile::Builder::new()
            .prefix(&hash_to_hex(hash))
            .suffix(".tmp")
            .tempfile_in(self.staging_dir())?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;

        let dest = self.entry_path(hash);
        temp.persist(&dest).map_err(|e| e.error)?;
        Ok(dest)
    }

    pub fn read(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        Ok(read_if_present(&self.entry_path(hash))?)
    }

    /// Finished entries in the spool root. Staging files are never listed.
    pub fn entries(&self) -> Result<Vec<SpoolEntry>> {
        let mut entries = Vec::new();
        for dirent in fs::read_dir(&self.root)? {
            let dirent = dirent?;
            if !dirent.file_type()?.is_file() {
                continue;
            }
            let path = dirent.path();
            if path.extension().map_or(true, |ext| ext != SPOOL_EXTENSION) {
                continue;
            }
            let hash = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(hex_to_hash);
            entries.push(SpoolEntry { path, hash });
        }
        Ok(entries)
    }

    /// Number of entries waiting for the mover.
    pub fn backlog(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }
}
