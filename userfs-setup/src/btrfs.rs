//! First-boot filesystem step: probe, format, mount, subvolumes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use userfs_hal::{FilesystemKind, MountOps, ProbeOps, ProcessOps};

use crate::config::SetupConfig;
use crate::disk::layout::PartitionEntry;
use crate::utils::{create_directory, partition_device_path};

/// Btrfs subvolumes carved out of the userfs partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subvolume {
    Data,
    Config,
}

impl Subvolume {
    pub const ALL: [Subvolume; 2] = [Subvolume::Data, Subvolume::Config];

    pub fn name(self) -> &'static str {
        match self {
            Subvolume::Data => "vol-data",
            Subvolume::Config => "vol-config",
        }
    }

    pub fn path(self, mount_root: &Path) -> PathBuf {
        mount_root.join(self.name())
    }
}

/// Make sure the userfs partition carries a mounted btrfs filesystem.
///
/// An unknown signature always triggers a format; existing btrfs and ext4
/// filesystems are preserved unless `force_format` is set. Subvolumes are
/// only created on a freshly formatted volume. The probe result is
/// recorded in `entry`.
pub fn ensure_btrfs<H>(
    hal: &H,
    cfg: &SetupConfig,
    force_format: bool,
    entry: &mut PartitionEntry,
) -> Result<()>
where
    H: ProbeOps + ProcessOps + MountOps,
{
    let device = partition_device_path(&cfg.device, entry.partno);
    let device_str = device.display().to_string();
    debug!("userfs partition device: {}", device_str);

    let fs = hal
        .probe_filesystem(&device)
        .with_context(|| format!("failed to probe filesystem on {}", device_str))?;
    debug!(
        "probed {}: type {} uuid {}",
        device_str,
        fs.kind.as_str(),
        fs.uuid.as_deref().unwrap_or("not set")
    );
    entry.filesystem = Some(fs.clone());

    let mut do_format = force_format;
    if force_format {
        info!("formatting {} to btrfs (forced)", device_str);
    }
    match fs.kind {
        FilesystemKind::Btrfs | FilesystemKind::Ext4 => {
            if !force_format {
                info!(
                    "userfs partition already formatted as {}, keeping it",
                    fs.kind.as_str()
                );
            }
        }
        _ => do_format = true,
    }

    if do_format {
        info!("creating btrfs filesystem on {}", device_str);
        hal.command_status("mkfs.btrfs", &["-f", &device_str])
            .context("mkfs.btrfs failed")?;
    }

    create_directory(&cfg.mount_root)?;

    if hal.is_mounted(&cfg.mount_root)? {
        debug!("{} is already mounted", cfg.mount_root.display());
    } else {
        info!("mounting btrfs filesystem on {}", cfg.mount_root.display());
        hal.mount(&device, &cfg.mount_root, "btrfs", None)
            .with_context(|| format!("failed to mount {} on {}", device_str, cfg.mount_root.display()))?;
    }

    if do_format {
        for subvolume in Subvolume::ALL {
            let path = subvolume.path(&cfg.mount_root);
            let path_str = path.display().to_string();
            info!("creating btrfs subvolume {}", path_str);
            hal.command_status("btrfs", &["subvolume", "create", &path_str])
                .with_context(|| format!("failed to create subvolume {}", path_str))?;
        }
    }

    Ok(())
}
