//! Runtime configuration.
//!
//! Resolved once at startup and threaded through every step; nothing in
//! here is process-global state.

use std::path::PathBuf;

use crate::cli::Cli;

/// Disk holding the boot, rootfs and userfs partitions.
pub const DISK_DEVICE: &str = "/dev/mmcblk0";

/// Where the userfs btrfs volume is mounted.
pub const USERFS_MOUNT_POINT: &str = "/mnt/userfs";

/// Slot of the userfs partition (0-based; the third partition on the
/// reference image).
const DATA_SLOT: usize = 2;

#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// Whole-disk block device.
    pub device: PathBuf,
    /// 0-based slot the userfs partition lives in (or should be created in).
    pub data_slot: usize,
    /// Optional slot of a swap partition to initialize.
    pub swap_slot: Option<usize>,
    /// Mount point for the userfs volume.
    pub mount_root: PathBuf,
    pub verbose: bool,
    pub delete: bool,
    pub force_format: bool,
    pub trust_resident: bool,
    pub skip_overlays: bool,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DISK_DEVICE),
            data_slot: DATA_SLOT,
            swap_slot: None,
            mount_root: PathBuf::from(USERFS_MOUNT_POINT),
            verbose: false,
            delete: false,
            force_format: false,
            trust_resident: false,
            skip_overlays: false,
        }
    }
}

impl SetupConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            verbose: cli.verbose,
            delete: cli.delete,
            force_format: cli.force_format,
            trust_resident: cli.trust_resident,
            skip_overlays: cli.skip_overlays,
            ..Self::default()
        }
    }
}
