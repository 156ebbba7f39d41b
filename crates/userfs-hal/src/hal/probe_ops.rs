//! Filesystem signature probing.

use crate::HalResult;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesystemKind {
    Btrfs,
    Ext4,
    Swap,
    Unknown,
}

impl FilesystemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FilesystemKind::Btrfs => "btrfs",
            FilesystemKind::Ext4 => "ext4",
            FilesystemKind::Swap => "swap",
            FilesystemKind::Unknown => "unknown",
        }
    }

    /// Map a blkid `TYPE` value; anything unrecognized is `Unknown`.
    pub fn from_blkid(value: &str) -> Self {
        match value {
            "btrfs" => FilesystemKind::Btrfs,
            "ext4" => FilesystemKind::Ext4,
            "swap" => FilesystemKind::Swap,
            _ => FilesystemKind::Unknown,
        }
    }
}

/// Result of probing one partition device. The UUID is the 36-character
/// form blkid reports, when a filesystem carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemInfo {
    pub kind: FilesystemKind,
    pub uuid: Option<String>,
}

impl FilesystemInfo {
    pub fn unknown() -> Self {
        Self {
            kind: FilesystemKind::Unknown,
            uuid: None,
        }
    }
}

pub trait ProbeOps {
    /// Detect the filesystem on a partition device. A device without any
    /// recognizable signature reports `Unknown`, not an error.
    fn probe_filesystem(&self, device: &Path) -> HalResult<FilesystemInfo>;
}
