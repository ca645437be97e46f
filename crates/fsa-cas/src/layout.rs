//! Shard directory layouts.
//!
//! Both layouts are pure functions of the hex digest and must stay
//! bit-compatible with trees written by earlier deployments.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How a hex digest is split into nested directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardLayout {
    /// `[0:2]/[2:4]/[4:6]/[6:10]`
    #[default]
    Core,
    /// `[0:3]/[3:6]`
    Osgrid,
}

impl ShardLayout {
    /// Directory segments for a 64-character hex digest.
    pub fn segments(self, hex: &str) -> Vec<&str> {
        match self {
            ShardLayout::Core => vec![&hex[0..2], &hex[2..4], &hex[4..6], &hex[6..10]],
            ShardLayout::Osgrid => vec![&hex[0..3], &hex[3..6]],
        }
    }

    pub fn shard_dir(self, root: &Path, hex: &str) -> PathBuf {
        self.segments(hex)
            .into_iter()
            .fold(root.to_path_buf(), |dir, segment| dir.join(segment))
    }
}
