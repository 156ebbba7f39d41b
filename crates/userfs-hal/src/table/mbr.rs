//! Real partition-table codec backed by mbrman.
//!
//! Slot mapping: internal slots 0..=3 are the primary entries (mbrman
//! indexes 1..=4), slots 4.. are logical volumes inside the extended
//! container (mbrman indexes 5..). Logical entries are stored EBR-relative
//! on disk; this adapter exposes absolute sector addresses only.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use mbrman::{CHS, MBR, MBRPartitionEntry};

use super::{AddPartition, SlotEntry, SECTOR_SIZE};
use crate::error::{HalError, HalResult};
use crate::table::TableOps;

const GPT_PROTECTIVE: u8 = 0xee;

#[derive(Debug)]
pub struct MbrTable {
    device: PathBuf,
    file: File,
    mbr: MBR,
    total_sectors: u64,
}

impl MbrTable {
    /// Open `device` read-write and load its DOS disklabel. Anything that
    /// is not a DOS table, including the protective MBR of a GPT disk, is
    /// rejected before any mutation can happen.
    pub fn assign(device: &Path) -> HalResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|source| HalError::DeviceAccess {
                device: device.to_path_buf(),
                source,
            })?;

        let len = file
            .seek(SeekFrom::End(0))
            .map_err(|source| HalError::DeviceAccess {
                device: device.to_path_buf(),
                source,
            })?;

        let mbr = MBR::read_from(&mut file, SECTOR_SIZE as u32).map_err(|err| {
            HalError::UnsupportedTableType {
                device: device.to_path_buf(),
                reason: err.to_string(),
            }
        })?;

        if mbr
            .header
            .iter()
            .any(|(_, p)| p.is_used() && p.sys == GPT_PROTECTIVE)
        {
            return Err(HalError::UnsupportedTableType {
                device: device.to_path_buf(),
                reason: "protective MBR of a GPT disk".to_string(),
            });
        }

        Ok(Self {
            device: device.to_path_buf(),
            file,
            mbr,
            total_sectors: len / SECTOR_SIZE,
        })
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Release the device handle, surfacing flush errors. Dropping the
    /// table releases the handle too, but silently.
    pub fn deassign(self) -> HalResult<()> {
        self.file.sync_all().map_err(|source| HalError::DeviceAccess {
            device: self.device.clone(),
            source,
        })
    }

    fn extended_container(&self) -> Option<(u64, u64)> {
        self.mbr
            .header
            .iter()
            .find(|(_, p)| p.is_used() && p.is_extended())
            .map(|(_, p)| (u64::from(p.starting_lba), u64::from(p.sectors)))
    }

    /// Absolute start of a logical volume: its EBR address plus the
    /// EBR-relative start stored in the entry itself.
    fn logical_start(&self, index: usize) -> Option<u64> {
        let logical = self.mbr.logical_partitions.get(index)?;
        Some(u64::from(logical.absolute_ebr_lba) + u64::from(logical.partition.starting_lba))
    }

    fn add_primary(&mut self, req: &AddPartition, start: u32, sectors: u32) -> HalResult<usize> {
        let end = req.start + req.size - 1;
        if end >= self.total_sectors {
            return Err(HalError::ValidationFailed(format!(
                "partition end sector {} is beyond the device ({} sectors)",
                end, self.total_sectors
            )));
        }

        let entry = self
            .mbr
            .header
            .get_mut(req.partno + 1)
            .ok_or_else(|| HalError::ValidationFailed(format!("bad primary slot {}", req.partno)))?;
        if entry.is_used() {
            return Err(HalError::SlotInUse(req.partno));
        }

        *entry = MBRPartitionEntry {
            boot: mbrman::BOOT_INACTIVE,
            first_chs: CHS::empty(),
            sys: req.type_code,
            last_chs: CHS::empty(),
            starting_lba: start,
            sectors,
        };
        Ok(req.partno)
    }

    fn add_logical(&mut self, req: &AddPartition, sectors: u32) -> HalResult<usize> {
        let (ext_start, ext_sectors) = self.extended_container().ok_or_else(|| {
            HalError::ValidationFailed("no extended container for a logical volume".to_string())
        })?;

        let end = req.start + req.size - 1;
        if req.start < ext_start || end > ext_start + ext_sectors - 1 {
            return Err(HalError::ValidationFailed(format!(
                "logical volume {}..{} does not fit the extended container {}..{}",
                req.start,
                end,
                ext_start,
                ext_start + ext_sectors - 1
            )));
        }

        // The EBR of the first volume heads the container; later EBRs sit
        // just past the previous volume's data. The gap between the EBR and
        // the requested start is the volume's header region.
        let ebr_lba = match self.mbr.logical_partitions.last() {
            None => ext_start,
            Some(prev) => {
                u64::from(prev.absolute_ebr_lba)
                    + u64::from(prev.partition.starting_lba)
                    + u64::from(prev.partition.sectors)
            }
        };
        if req.start <= ebr_lba {
            return Err(HalError::ValidationFailed(format!(
                "logical volume start {} leaves no room for its header at {}",
                req.start, ebr_lba
            )));
        }
        let relative_start = sector_to_u32(req.start - ebr_lba)?;
        let ebr_lba = sector_to_u32(ebr_lba)?;

        let assigned = 4 + self.mbr.logical_partitions.len();
        self.mbr.logical_partitions.push(mbrman::LogicalPartition {
            partition: MBRPartitionEntry {
                boot: mbrman::BOOT_INACTIVE,
                first_chs: CHS::empty(),
                sys: req.type_code,
                last_chs: CHS::empty(),
                starting_lba: relative_start,
                sectors,
            },
            absolute_ebr_lba: ebr_lba,
            ebr_sectors: Some(relative_start + sectors),
            ebr_first_chs: CHS::empty(),
            ebr_last_chs: Some(CHS::empty()),
            bootstrap_code: [0; 446],
        });
        Ok(assigned)
    }
}

fn sector_to_u32(value: u64) -> HalResult<u32> {
    u32::try_from(value).map_err(|_| {
        HalError::ValidationFailed(format!("sector {} is beyond the 32-bit MBR range", value))
    })
}

impl TableOps for MbrTable {
    fn total_sectors(&self) -> u64 {
        self.total_sectors
    }

    fn slot(&self, slot: usize) -> Option<SlotEntry> {
        let entry = self.mbr.get(slot + 1)?;
        if entry.is_unused() {
            return None;
        }
        let start = if slot < 4 {
            u64::from(entry.starting_lba)
        } else {
            self.logical_start(slot - 4)?
        };
        let size = u64::from(entry.sectors);
        Some(SlotEntry {
            partno: slot,
            start,
            end: start + size - 1,
            size,
            type_code: entry.sys,
        })
    }

    fn add_partition(&mut self, req: &AddPartition) -> HalResult<usize> {
        if req.size == 0 {
            return Err(HalError::ValidationFailed(
                "partition size must not be zero".to_string(),
            ));
        }
        let start = sector_to_u32(req.start)?;
        let sectors = sector_to_u32(req.size)?;

        if req.partno < 4 {
            self.add_primary(req, start, sectors)
        } else {
            self.add_logical(req, sectors)
        }
    }

    fn delete_partition(&mut self, slot: usize) -> HalResult<()> {
        if slot < 4 {
            let entry = self
                .mbr
                .header
                .get_mut(slot + 1)
                .ok_or(HalError::SlotNotFound(slot))?;
            if entry.is_unused() {
                return Err(HalError::SlotNotFound(slot));
            }
            *entry = MBRPartitionEntry::empty();
        } else {
            let index = slot - 4;
            if index >= self.mbr.logical_partitions.len() {
                return Err(HalError::SlotNotFound(slot));
            }
            self.mbr.logical_partitions.remove(index);
        }
        Ok(())
    }

    fn write_disklabel(&mut self) -> HalResult<()> {
        self.mbr
            .write_into(&mut self.file)
            .map_err(|err| HalError::Commit {
                device: self.device.clone(),
                reason: err.to_string(),
            })?;
        self.file.sync_all().map_err(|err| HalError::Commit {
            device: self.device.clone(),
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{PARTTYPE_EXTENDED, PARTTYPE_FAT32_LBA, PARTTYPE_LINUX};
    use std::io::{Read, Write};
    use tempfile::NamedTempFile;

    const TOTAL_SECTORS: u64 = 1_000_000;

    /// Write a boot sector by hand so the adapter is exercised against a
    /// table it did not produce itself.
    fn raw_entry(sector: &mut [u8], slot: usize, sys: u8, start: u32, sectors: u32) {
        let off = 446 + slot * 16;
        sector[off + 4] = sys;
        sector[off + 8..off + 12].copy_from_slice(&start.to_le_bytes());
        sector[off + 12..off + 16].copy_from_slice(&sectors.to_le_bytes());
    }

    fn seed_image(parts: &[(usize, u8, u32, u32)]) -> NamedTempFile {
        let mut image = NamedTempFile::new().unwrap();
        let mut sector = vec![0u8; SECTOR_SIZE as usize];
        for &(slot, sys, start, sectors) in parts {
            raw_entry(&mut sector, slot, sys, start, sectors);
        }
        sector[510] = 0x55;
        sector[511] = 0xaa;
        image.write_all(&sector).unwrap();
        image
            .as_file()
            .set_len(TOTAL_SECTORS * SECTOR_SIZE)
            .unwrap();
        image
    }

    #[test]
    fn assign_reads_primary_slots() {
        let image = seed_image(&[
            (0, PARTTYPE_FAT32_LBA, 2_048, 100_000),
            (1, PARTTYPE_LINUX, 102_048, 200_000),
        ]);
        let table = MbrTable::assign(image.path()).unwrap();

        assert_eq!(table.total_sectors(), TOTAL_SECTORS);
        let slot0 = table.slot(0).unwrap();
        assert_eq!(slot0.start, 2_048);
        assert_eq!(slot0.end, 102_047);
        assert_eq!(slot0.size, 100_000);
        assert_eq!(slot0.type_code, PARTTYPE_FAT32_LBA);
        let slot1 = table.slot(1).unwrap();
        assert_eq!(slot1.start, 102_048);
        assert_eq!(slot1.type_code, PARTTYPE_LINUX);
        assert!(table.slot(2).is_none());
        assert!(!table.is_slot_used(3));
    }

    #[test]
    fn assign_rejects_a_blank_device() {
        let image = NamedTempFile::new().unwrap();
        image.as_file().set_len(TOTAL_SECTORS * SECTOR_SIZE).unwrap();

        let err = MbrTable::assign(image.path()).unwrap_err();
        assert!(matches!(err, HalError::UnsupportedTableType { .. }));
    }

    #[test]
    fn assign_rejects_a_protective_gpt_label() {
        let image = seed_image(&[(0, 0xee, 1, 999_999)]);
        let err = MbrTable::assign(image.path()).unwrap_err();
        assert!(matches!(err, HalError::UnsupportedTableType { .. }));
    }

    #[test]
    fn added_primary_survives_a_commit_and_reread() {
        let image = seed_image(&[(0, PARTTYPE_LINUX, 2_048, 100_000)]);

        let mut table = MbrTable::assign(image.path()).unwrap();
        let assigned = table
            .add_partition(&AddPartition {
                partno: 1,
                start: 102_048,
                size: TOTAL_SECTORS - 102_048,
                type_code: PARTTYPE_LINUX,
            })
            .unwrap();
        assert_eq!(assigned, 1);
        table.write_disklabel().unwrap();
        table.deassign().unwrap();

        let reread = MbrTable::assign(image.path()).unwrap();
        let slot1 = reread.slot(1).unwrap();
        assert_eq!(slot1.start, 102_048);
        assert_eq!(slot1.end, TOTAL_SECTORS - 1);
        assert_eq!(slot1.size, TOTAL_SECTORS - 102_048);
    }

    #[test]
    fn add_rejects_an_occupied_slot() {
        let image = seed_image(&[(0, PARTTYPE_LINUX, 2_048, 100_000)]);
        let mut table = MbrTable::assign(image.path()).unwrap();

        let err = table
            .add_partition(&AddPartition {
                partno: 0,
                start: 200_000,
                size: 1_000,
                type_code: PARTTYPE_LINUX,
            })
            .unwrap_err();
        assert!(matches!(err, HalError::SlotInUse(0)));
    }

    #[test]
    fn add_rejects_sectors_beyond_the_device() {
        let image = seed_image(&[(0, PARTTYPE_LINUX, 2_048, 100_000)]);
        let mut table = MbrTable::assign(image.path()).unwrap();

        let err = table
            .add_partition(&AddPartition {
                partno: 1,
                start: 102_048,
                size: TOTAL_SECTORS,
                type_code: PARTTYPE_LINUX,
            })
            .unwrap_err();
        assert!(matches!(err, HalError::ValidationFailed(_)));
    }

    #[test]
    fn logical_volumes_roundtrip_through_the_ebr_chain() {
        let header = 2_048;
        let ext_start = 500_000u64;
        let image = seed_image(&[
            (0, PARTTYPE_LINUX, 2_048, 200_000),
            (1, PARTTYPE_LINUX, 202_048, 200_000),
            (2, PARTTYPE_LINUX, 402_048, 97_952),
            (3, PARTTYPE_EXTENDED, ext_start as u32, (TOTAL_SECTORS - ext_start) as u32),
        ]);

        let mut table = MbrTable::assign(image.path()).unwrap();
        let first = table
            .add_partition(&AddPartition {
                partno: 4,
                start: ext_start + header,
                size: 100_000,
                type_code: PARTTYPE_LINUX,
            })
            .unwrap();
        assert_eq!(first, 4);
        let first_end = ext_start + header + 100_000 - 1;
        let second = table
            .add_partition(&AddPartition {
                partno: 5,
                start: first_end + header + 1,
                size: TOTAL_SECTORS - (first_end + header + 1),
                type_code: PARTTYPE_LINUX,
            })
            .unwrap();
        assert_eq!(second, 5);
        table.write_disklabel().unwrap();
        table.deassign().unwrap();

        let reread = MbrTable::assign(image.path()).unwrap();
        let moved = reread.slot(4).unwrap();
        assert_eq!(moved.start, ext_start + header);
        assert_eq!(moved.size, 100_000);
        let data = reread.slot(5).unwrap();
        assert_eq!(data.start, first_end + header + 1);
        assert_eq!(data.end, TOTAL_SECTORS - 1);
    }

    #[test]
    fn logical_add_without_container_is_rejected() {
        let image = seed_image(&[(0, PARTTYPE_LINUX, 2_048, 100_000)]);
        let mut table = MbrTable::assign(image.path()).unwrap();

        let err = table
            .add_partition(&AddPartition {
                partno: 4,
                start: 200_000,
                size: 10_000,
                type_code: PARTTYPE_LINUX,
            })
            .unwrap_err();
        assert!(matches!(err, HalError::ValidationFailed(_)));
    }

    #[test]
    fn delete_clears_a_primary_slot() {
        let image = seed_image(&[
            (0, PARTTYPE_LINUX, 2_048, 100_000),
            (1, PARTTYPE_LINUX, 102_048, 100_000),
        ]);
        let mut table = MbrTable::assign(image.path()).unwrap();

        table.delete_partition(1).unwrap();
        assert!(table.slot(1).is_none());

        let err = table.delete_partition(1).unwrap_err();
        assert!(matches!(err, HalError::SlotNotFound(1)));
    }

    #[test]
    fn commit_only_touches_the_table_bytes() {
        let image = seed_image(&[(0, PARTTYPE_LINUX, 2_048, 100_000)]);

        // Payload inside the existing partition, away from the boot sector.
        let payload_offset = 2_048 * SECTOR_SIZE;
        {
            let mut f = OpenOptions::new().write(true).open(image.path()).unwrap();
            f.seek(SeekFrom::Start(payload_offset)).unwrap();
            f.write_all(b"payload").unwrap();
        }

        let mut table = MbrTable::assign(image.path()).unwrap();
        table
            .add_partition(&AddPartition {
                partno: 1,
                start: 102_048,
                size: 10_000,
                type_code: PARTTYPE_LINUX,
            })
            .unwrap();
        table.write_disklabel().unwrap();
        table.deassign().unwrap();

        let mut f = File::open(image.path()).unwrap();
        f.seek(SeekFrom::Start(payload_offset)).unwrap();
        let mut buf = [0u8; 7];
        f.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"payload");
    }
}
