//! Swap partition initialization.

use anyhow::{Context, Result};
use log::info;
use userfs_hal::{FilesystemKind, ProbeOps, ProcessOps};

use crate::config::SetupConfig;
use crate::disk::layout::PartitionEntry;
use crate::utils::partition_device_path;

/// Initialize the swap partition in `slot` unless it already carries a
/// swap signature. The probe result is recorded in `entry`.
pub fn ensure_swap<H>(
    hal: &H,
    cfg: &SetupConfig,
    slot: usize,
    entry: &mut PartitionEntry,
) -> Result<()>
where
    H: ProbeOps + ProcessOps,
{
    let device = partition_device_path(&cfg.device, slot);
    let device_str = device.display().to_string();
    info!("checking swap partition {} ({})", slot, device_str);

    let fs = hal
        .probe_filesystem(&device)
        .with_context(|| format!("failed to probe swap partition {}", device_str))?;
    entry.filesystem = Some(fs.clone());

    if fs.kind == FilesystemKind::Swap {
        info!("swap partition {} already formatted, skipping", slot);
        return Ok(());
    }

    hal.command_status("mkswap", &[device_str.as_str()])
        .context("mkswap failed")?;
    info!("swap space created on {}", device_str);
    Ok(())
}
