//! Applies placement decisions to the table codec.
//!
//! Every mutation is one explicit step; applying a step re-reads the whole
//! table so the next step always starts from the codec's authoritative
//! state, never from stale aggregates. Mutations stay in the codec's
//! memory until the single `write_disklabel` at the end of the create or
//! delete path; that write is the only durable point and there is no
//! rollback across it.

use log::info;
use userfs_hal::table::PARTTYPE_EXTENDED;
use userfs_hal::{AddPartition, TableOps};

use crate::disk::layout::{log_layout, read_layout, DiskLayout};
use crate::disk::planner::{plan_create, Placement};
use crate::disk::{LOGICAL_HEADER_SECTORS, USERFS_PART_CODE};
use crate::errors::UserfsError;

/// Result of the create path, as consumed by the formatting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// The partition was created in this run: first boot.
    Created,
    /// The partition was already in the table.
    AlreadyExisted,
}

/// One table mutation.
#[derive(Debug, Clone, Copy)]
enum Step {
    Add(AddPartition),
    Delete { slot: usize },
}

/// Apply one mutation, then re-read the table and return the fresh layout.
fn apply_step(table: &mut dyn TableOps, step: Step) -> Result<DiskLayout, UserfsError> {
    match step {
        Step::Add(req) => {
            info!(
                "adding partition {}: start={} size={} type={:#04x}",
                req.partno, req.start, req.size, req.type_code
            );
            let assigned = table.add_partition(&req)?;
            if assigned != req.partno {
                return Err(UserfsError::PlanConsistency(format!(
                    "requested slot {} but the table assigned {}",
                    req.partno, assigned
                )));
            }
        }
        Step::Delete { slot } => {
            info!("deleting partition {}", slot);
            table.delete_partition(slot)?;
        }
    }

    let layout = read_layout(table);
    log_layout(&layout);
    Ok(layout)
}

/// Create the userfs partition in `desired_slot` from the remaining free
/// space, committing at most once. Reports `AlreadyExisted` without
/// touching the table when the slot is occupied.
pub fn create_userfs_partition(
    table: &mut dyn TableOps,
    desired_slot: usize,
) -> Result<PartitionOutcome, UserfsError> {
    let layout = read_layout(table);
    log_layout(&layout);

    match plan_create(&layout, desired_slot)? {
        Placement::AlreadyExists => {
            info!("partition {} is already defined", desired_slot);
            Ok(PartitionOutcome::AlreadyExisted)
        }
        Placement::NewPrimary => {
            add_primary(table, &layout)?;
            table.write_disklabel()?;
            Ok(PartitionOutcome::Created)
        }
        Placement::ExtendLast => {
            extend_last_partition(table, &layout)?;
            table.write_disklabel()?;
            Ok(PartitionOutcome::Created)
        }
    }
}

/// Delete the userfs partition and commit. An unused slot is a no-op and
/// nothing is written.
pub fn delete_userfs_partition(
    table: &mut dyn TableOps,
    slot: usize,
) -> Result<bool, UserfsError> {
    let layout = read_layout(table);
    log_layout(&layout);

    if slot >= layout.partitions.len() {
        return Err(UserfsError::UnsupportedSlot(slot));
    }
    if !layout.partitions[slot].used {
        info!("partition {} is not in use, nothing to delete", slot);
        return Ok(false);
    }

    apply_step(table, Step::Delete { slot })?;
    table.write_disklabel()?;
    info!("partition {} deleted", slot);
    Ok(true)
}

/// New primary partition spanning all trailing free space.
fn add_primary(table: &mut dyn TableOps, layout: &DiskLayout) -> Result<(), UserfsError> {
    let slot = match layout.last_used {
        Some(last) => last + 1,
        None => 0,
    };
    if slot > 3 {
        return Err(UserfsError::PlanConsistency(
            "no free primary slot left".to_string(),
        ));
    }

    let start = layout.next_free_sector;
    let end = layout.total_sectors - 1;
    let size = layout.free_sectors;

    info!(
        "creating userfs partition: start={} end={} size={}",
        start, end, size
    );

    if let Some(last) = layout.last_used {
        let prev = &layout.partitions[last];
        if prev.end + 1 != start {
            return Err(UserfsError::PlanConsistency(format!(
                "slot {} ends at {} but the new partition starts at {}",
                last, prev.end, start
            )));
        }
    }
    if end - start + 1 != size {
        return Err(UserfsError::PlanConsistency(format!(
            "size {} does not match sectors {}..{}",
            size, start, end
        )));
    }

    apply_step(
        table,
        Step::Add(AddPartition {
            partno: slot,
            start,
            size,
            type_code: USERFS_PART_CODE,
        }),
    )?;
    Ok(())
}

/// Replace the last primary partition with an extended container holding
/// the relocated original and the new userfs volume.
///
/// Four steps, each synchronized with a re-read: delete the old primary,
/// add the container over the freed region plus the trailing free space,
/// re-add the original as the first logical volume, add the userfs volume
/// behind it. Each logical volume starts one header gap after the sectors
/// preceding it.
fn extend_last_partition(table: &mut dyn TableOps, layout: &DiskLayout) -> Result<(), UserfsError> {
    let old = &layout.partitions[3];
    let old_size = old.size;
    let old_type = old.type_code;

    let layout = apply_step(table, Step::Delete { slot: 3 })?;

    let layout = apply_step(
        table,
        Step::Add(AddPartition {
            partno: 3,
            start: layout.next_free_sector,
            size: layout.free_sectors,
            type_code: PARTTYPE_EXTENDED,
        }),
    )?;
    let container = layout.partitions[3].clone();
    if !container.used || container.type_code != PARTTYPE_EXTENDED {
        return Err(UserfsError::PlanConsistency(
            "extended container did not read back from slot 3".to_string(),
        ));
    }

    let layout = apply_step(
        table,
        Step::Add(AddPartition {
            partno: 4,
            start: container.start + LOGICAL_HEADER_SECTORS,
            size: old_size,
            type_code: old_type,
        }),
    )?;
    let moved = layout.partitions[4].clone();
    if !moved.used || moved.size != old_size {
        return Err(UserfsError::PlanConsistency(
            "relocated partition did not read back from slot 4".to_string(),
        ));
    }

    let start = moved.end + LOGICAL_HEADER_SECTORS + 1;
    let end = container.end;
    if start >= end {
        return Err(UserfsError::PlanConsistency(format!(
            "no room left in the extended container: {}..{}",
            start, end
        )));
    }
    let layout = apply_step(
        table,
        Step::Add(AddPartition {
            partno: 5,
            start,
            size: end - start + 1,
            type_code: USERFS_PART_CODE,
        }),
    )?;
    if !layout.partitions[5].used {
        return Err(UserfsError::PlanConsistency(
            "userfs volume did not read back from slot 5".to_string(),
        ));
    }

    Ok(())
}
