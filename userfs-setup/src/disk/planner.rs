//! Placement decisions for the userfs partition.
//!
//! The planner only looks at the layout model; it never asks the codec
//! anything. Geometry for the individual mutation steps is computed later,
//! from a fresh read after each step.

use crate::disk::layout::DiskLayout;
use crate::disk::USERFS_MIN_SECTORS;
use crate::errors::UserfsError;
use userfs_hal::table::PARTTYPE_EXTENDED;

/// How a requested slot can be realized on the current layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The slot is already occupied; nothing to mutate.
    AlreadyExists,
    /// A primary slot after the last used one takes the partition.
    NewPrimary,
    /// All primary slots are taken: the last one has to move into a fresh
    /// extended container, followed by the new volume.
    ExtendLast,
}

pub fn plan_create(layout: &DiskLayout, desired_slot: usize) -> Result<Placement, UserfsError> {
    if desired_slot >= layout.partitions.len() {
        return Err(UserfsError::UnsupportedSlot(desired_slot));
    }

    if layout.partitions[desired_slot].used {
        return Ok(Placement::AlreadyExists);
    }

    if layout.free_sectors < USERFS_MIN_SECTORS {
        return Err(UserfsError::InsufficientSpace {
            free_sectors: layout.free_sectors,
            required: USERFS_MIN_SECTORS,
        });
    }

    match desired_slot {
        0..=3 => match layout.last_used {
            Some(last) if last >= 3 => Err(UserfsError::PlanConsistency(format!(
                "no free primary slot for {}: slot {} is already used",
                desired_slot, last
            ))),
            _ => Ok(Placement::NewPrimary),
        },
        5 => {
            if !layout.partitions[..4].iter().all(|p| p.used) {
                return Err(UserfsError::PlanConsistency(
                    "extended conversion requires all four primary slots in use".to_string(),
                ));
            }
            if layout.partitions[3].type_code == PARTTYPE_EXTENDED {
                return Err(UserfsError::PlanConsistency(
                    "slot 3 already holds an extended container".to_string(),
                ));
            }
            Ok(Placement::ExtendLast)
        }
        other => Err(UserfsError::UnsupportedSlot(other)),
    }
}
