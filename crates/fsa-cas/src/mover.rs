//! Shard mover: drains the spool into the sharded tree.
//!
//! A sweep never fails as a whole. Entries that cannot be moved stay in the
//! spool and are picked up again by the next sweep.

use std::fs;
use std::io;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{hash_to_hex, ShardedStore, Spool, SpoolEntry};

/// What one sweep did with the spool entries it found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Compressed into the tree and removed from the spool
    pub moved: usize,
    /// Tree already held the blob; spool copy discarded
    pub already_present: usize,
    /// Left in the spool for the next sweep
    pub deferred: usize,
    /// Unparseable names or entries that vanished mid-sweep
    pub skipped: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.moved + self.already_present + self.deferred + self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn record(mut self, outcome: Outcome) -> Self {
        match outcome {
            Outcome::Moved => self.moved += 1,
            Outcome::AlreadyPresent => self.already_present += 1,
            Outcome::Deferred => self.deferred += 1,
            Outcome::Skipped => self.skipped += 1,
        }
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            moved: self.moved + other.moved,
            already_present: self.already_present + other.already_present,
            deferred: self.deferred + other.deferred,
            skipped: self.skipped + other.skipped,
        }
    }
}

enum Outcome {
    Moved,
    AlreadyPresent,
    Deferred,
    Skipped,
}

/// Move every finished spool entry into the sharded tree.
pub fn sweep(spool: &Spool, shards: &ShardedStore) -> SweepReport {
    let entries = match spool.entries() {
        Ok(entries) => entries,
        Err(e) => {
            warn!(spool = %spool.root().display(), error = %e, "Failed to list spool");
            return SweepReport::default();
        }
    };

    let report = entries
        .par_iter()
        .map(|entry| move_entry(shards, entry))
        .fold(SweepReport::default, SweepReport::record)
        .reduce(SweepReport::default, SweepReport::merge);

    if !report.is_empty() {
        debug!(?report, "Spool sweep finished");
    }
    report
}

fn move_entry(shards: &ShardedStore, entry: &SpoolEntry) -> Outcome {
    let Some(hash) = entry.hash else {
        warn!(path = %entry.path.display(), "Skipping spool file with unparseable name");
        return Outcome::Skipped;
    };

    let dir = shards.shard_dir(&hash);
    if let Err(e) = ensure_shard_dir(shards.root(), &dir) {
        warn!(
            hash = %hash_to_hex(&hash),
            dir = %dir.display(),
            error = %e,
            "Cannot create shard directory, leaving entry in spool"
        );
        return Outcome::Deferred;
    }

    if shards.compressed_path(&hash).is_file() {
        discard(&entry.path);
        return Outcome::AlreadyPresent;
    }

    let data = match fs::read(&entry.path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Outcome::Skipped,
        Err(e) => {
            warn!(path = %entry.path.display(), error = %e, "Failed to read spool entry");
            return Outcome::Deferred;
        }
    };

    match shards.write_compressed(&hash, &data) {
        Ok(true) => {
            discard(&entry.path);
            Outcome::Moved
        }
        Ok(false) => {
            discard(&entry.path);
            Outcome::AlreadyPresent
        }
        Err(e) => {
            warn!(
                hash = %hash_to_hex(&hash),
                error = %e,
                "Failed to write shard file, leaving entry in spool"
            );
            Outcome::Deferred
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove spool entry");
        }
    }
}

fn ensure_shard_dir(root: &Path, dir: &Path) -> io::Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(first) => {
            if clear_path_collision(root, dir)? {
                fs::create_dir_all(dir)
            } else {
                Err(first)
            }
        }
    }
}

/// Remove a plain file occupying one of `dir`'s path segments below `root`.
///
/// Walks upward from `dir` and deletes the first ancestor that exists but is
/// not a directory. This is a best-effort repair for legacy trees where a
/// stray file was written at a shard directory's name; it makes no general
/// guarantee about the state of the filesystem. Returns whether anything was
/// removed.
pub fn clear_path_collision(root: &Path, dir: &Path) -> io::Result<bool> {
    for candidate in dir.ancestors().take_while(|p| *p != root && p.starts_with(root)) {
        match fs::metadata(candidate) {
            Ok(meta) if !meta.is_dir() => {
                warn!(path = %candidate.display(), "Removing file that blocks a shard directory");
                fs::remove_file(candidate)?;
                return Ok(true);
            }
            _ => continue,
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HashAlgorithm, ShardLayout};
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> (Spool, ShardedStore) {
        let spool = Spool::open(temp.path().join("spool")).unwrap();
        let shards = ShardedStore::open(temp.path().join("base"), ShardLayout::Core).unwrap();
        (spool, shards)
    }

    #[test]
    fn test_sweep_moves_and_empties_spool() {
        let temp = TempDir::new().unwrap();
        let (spool, shards) = setup(&temp);

        for i in 0..10 {
            let data = format!("blob {}", i);
            let hash = HashAlgorithm::Sha256.digest(data.as_bytes());
            spool.write(&hash, data.as_bytes()).unwrap();
        }

        let report = sweep(&spool, &shards);
        assert_eq!(report.moved, 10);
        assert_eq!(spool.backlog().unwrap(), 0);
        assert_eq!(shards.stats().unwrap().compressed_blobs, 10);
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let (spool, shards) = setup(&temp);
        let hash = HashAlgorithm::Sha256.digest(b"again");

        spool.write(&hash, b"again").unwrap();
        sweep(&spool, &shards);
        let first = fs::read(shards.compressed_path(&hash)).unwrap();

        // Same content spooled again after it was sharded
        spool.write(&hash, b"again").unwrap();
        let report = sweep(&spool, &shards);
        assert_eq!(report.already_present, 1);
        assert_eq!(fs::read(shards.compressed_path(&hash)).unwrap(), first);
        assert_eq!(shards.stats().unwrap().blob_count(), 1);

        assert!(sweep(&spool, &shards).is_empty());
    }

    #[test]
    fn test_unparseable_entry_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let (spool, shards) = setup(&temp);
        let stray = spool.root().join("garbage.asset");
        fs::write(&stray, b"?").unwrap();

        let report = sweep(&spool, &shards);
        assert_eq!(report.skipped, 1);
        assert!(stray.exists());
    }

    #[test]
    fn test_collision_file_is_cleared() {
        let temp = TempDir::new().unwrap();
        let (spool, shards) = setup(&temp);
        let hash = HashAlgorithm::Sha256.digest(b"hello");

        // A plain file sits where the second-level directory should be
        let blocker = shards.root().join("2c").join("f2");
        fs::create_dir_all(blocker.parent().unwrap()).unwrap();
        fs::write(&blocker, b"stray").unwrap();

        spool.write(&hash, b"hello").unwrap();
        let report = sweep(&spool, &shards);

        assert_eq!(report.moved, 1);
        assert!(blocker.is_dir());
        assert_eq!(shards.read(&hash).unwrap().unwrap(), b"hello");
    }

    #[test]
    fn test_clear_path_collision_without_blocker() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let dir = root.join("aa").join("bb");
        assert!(!clear_path_collision(root, &dir).unwrap());
    }

    #[test]
    fn test_clear_path_collision_never_touches_root() {
        let temp = TempDir::new().unwrap();
        let outer = temp.path().join("not-a-dir");
        fs::write(&outer, b"x").unwrap();

        // Root itself is a file: nothing below it can be cleared
        let dir = outer.join("aa");
        assert!(!clear_path_collision(&outer, &dir).unwrap());
        assert!(outer.is_file());
    }
}
