//! In-memory model of the on-disk partition table.

use log::debug;
use userfs_hal::table::parttype_name;
use userfs_hal::{FilesystemInfo, TableOps, MAX_SLOTS, SECTOR_SIZE};

const MB: u64 = 1024 * 1024;

/// One slot of the layout model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionEntry {
    /// 0-based slot index; on-disk partition numbers are this plus one.
    pub partno: usize,
    pub start: u64,
    pub end: u64,
    pub size: u64,
    pub used: bool,
    pub type_code: u8,
    pub type_name: &'static str,
    /// Filled by an explicit probe of the partition device, never inferred
    /// from the table.
    pub filesystem: Option<FilesystemInfo>,
}

/// Process-local view of the table, rebuilt from the codec on every read.
/// The aggregate fields are derived during the read and never edited
/// directly; after any mutation the whole model is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskLayout {
    pub total_sectors: u64,
    pub partitions: [PartitionEntry; MAX_SLOTS],
    /// Highest used slot, `None` on an empty table.
    pub last_used: Option<usize>,
    pub next_free_sector: u64,
    pub free_sectors: u64,
    pub free_size_bytes: u64,
}

impl DiskLayout {
    pub fn total_size_bytes(&self) -> u64 {
        self.total_sectors * SECTOR_SIZE
    }
}

/// Scan every slot of the codec and recompute the aggregates.
pub fn read_layout(table: &dyn TableOps) -> DiskLayout {
    let total_sectors = table.total_sectors();

    let mut partitions: [PartitionEntry; MAX_SLOTS] = Default::default();
    for (slot, entry) in partitions.iter_mut().enumerate() {
        entry.partno = slot;
        if let Some(info) = table.slot(slot) {
            entry.used = true;
            entry.start = info.start;
            entry.end = info.end;
            entry.size = info.size;
            entry.type_code = info.type_code;
            entry.type_name = parttype_name(info.type_code);
        }
    }

    let last_used = partitions.iter().rposition(|p| p.used);
    // An empty table reads as free space from sector zero; either way the
    // subtraction below must not underflow.
    let next_free_sector = match last_used {
        Some(i) => partitions[i].end + 1,
        None => 0,
    };
    let free_sectors = total_sectors.saturating_sub(next_free_sector);

    DiskLayout {
        total_sectors,
        partitions,
        last_used,
        next_free_sector,
        free_sectors,
        free_size_bytes: free_sectors * SECTOR_SIZE,
    }
}

pub fn log_layout(layout: &DiskLayout) {
    debug!(
        "disk layout: {} sectors total ({} MB), {} sectors free ({} MB)",
        layout.total_sectors,
        layout.total_size_bytes() / MB,
        layout.free_sectors,
        layout.free_size_bytes / MB,
    );

    for p in layout.partitions.iter().filter(|p| p.used) {
        debug!(
            "[{}] {} ({:#04x}) start: {} end: {} size: {} ({} MB)",
            p.partno,
            p.type_name,
            p.type_code,
            p.start,
            p.end,
            p.size,
            p.size * SECTOR_SIZE / MB,
        );
    }
}
