//! Provision persistent storage on a device with a read-only rootfs.
//!
//! On every boot the tool inspects the DOS partition table of the boot
//! device, extends it with a userfs partition sized to the rest of the
//! disk if one is missing, formats the partition with btrfs subvolumes on
//! first boot, and layers writable overlay mounts for the managed system
//! directories on top.

pub mod btrfs;
pub mod cli;
pub mod config;
pub mod disk;
pub mod errors;
pub mod logging;
pub mod overlays;
pub mod swap;
pub mod utils;

use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use userfs_hal::{
    BlockDevOps, LinuxHal, MbrTable, MountOps, ProbeOps, ProcessOps, TableOps, SECTOR_SIZE,
};

use config::SetupConfig;
use disk::layout::{read_layout, DiskLayout};
use disk::provision::{self, PartitionOutcome};
use errors::{Result, UserfsError};

pub fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let cfg = SetupConfig::from_cli(&cli);
    logging::init(cfg.verbose);

    let hal = LinuxHal::new();
    info!("provisioning userfs on {}", cfg.device.display());

    // An early return below drops the table, which still releases the
    // device handle before the process exits.
    let mut table = MbrTable::assign(&cfg.device)?;
    let outcome = provision_table(&hal, &mut table, &cfg)?;
    let mut layout = read_layout(&table);
    table.deassign().context("failed to release the device")?;

    let Some(outcome) = outcome else {
        info!("userfs partition deleted, nothing left to do");
        return Ok(());
    };

    finish_first_boot(&hal, &cfg, outcome, &mut layout)
}

/// Table half of the run: capacity cross-check, then either the delete
/// path (returns `None`, the program is done) or the create path.
pub fn provision_table<H, T>(
    hal: &H,
    table: &mut T,
    cfg: &SetupConfig,
) -> Result<Option<PartitionOutcome>>
where
    H: BlockDevOps,
    T: TableOps,
{
    let device_size = hal
        .device_size(&cfg.device)
        .context("failed to get device size")?;
    debug!("device size: {} bytes", device_size);

    // The codec and the kernel have to agree on capacity before anything
    // is planned against "the rest of the disk".
    let table_bytes = table.total_sectors() * SECTOR_SIZE;
    if device_size != table_bytes {
        return Err(UserfsError::PlanConsistency(format!(
            "device reports {} bytes but the table covers {} bytes",
            device_size, table_bytes
        ))
        .into());
    }

    if cfg.delete {
        provision::delete_userfs_partition(table, cfg.data_slot)?;
        return Ok(None);
    }

    let outcome = provision::create_userfs_partition(table, cfg.data_slot)?;
    Ok(Some(outcome))
}

/// Everything after the table is committed: refresh the kernel's view,
/// apply the first-boot formatting policy, mount the volume and the
/// overlays, and initialize swap when configured. Probe results are
/// recorded in the layout entries as the steps touch their partitions.
pub fn finish_first_boot<H>(
    hal: &H,
    cfg: &SetupConfig,
    outcome: PartitionOutcome,
    layout: &mut DiskLayout,
) -> Result<()>
where
    H: ProbeOps + ProcessOps + MountOps,
{
    if !layout.partitions[cfg.data_slot].used {
        return Err(UserfsError::PlanConsistency(format!(
            "userfs partition {} is not in the table after provisioning",
            cfg.data_slot
        ))
        .into());
    }

    let device_str = cfg.device.display().to_string();
    hal.command_status("partprobe", &[device_str.as_str()])
        .context("partprobe failed")?;

    let force_format = match outcome {
        PartitionOutcome::Created => {
            if cfg.trust_resident {
                info!("first boot: trusting whatever filesystem the new partition carries");
                cfg.force_format
            } else {
                info!("first boot: the new userfs partition will be formatted");
                true
            }
        }
        PartitionOutcome::AlreadyExisted => cfg.force_format,
    };

    btrfs::ensure_btrfs(hal, cfg, force_format, &mut layout.partitions[cfg.data_slot])?;

    if cfg.skip_overlays {
        info!("skipping overlay setup");
    } else {
        overlays::setup_overlays(hal, cfg)?;
    }

    if let Some(slot) = cfg.swap_slot {
        if slot >= layout.partitions.len() {
            return Err(UserfsError::UnsupportedSlot(slot).into());
        }
        swap::ensure_swap(hal, cfg, slot, &mut layout.partitions[slot])?;
    }

    Ok(())
}
