//! DOS partition-table extension engine.
//!
//! `layout` rebuilds the in-memory model from the codec, `planner` decides
//! how a requested slot can be realized, and `provision` applies the
//! decision against the codec with a re-read after every mutation and a
//! single durable commit at the end.

pub mod layout;
pub mod planner;
pub mod provision;

pub use layout::{read_layout, DiskLayout, PartitionEntry};
pub use planner::{plan_create, Placement};
pub use provision::{create_userfs_partition, delete_userfs_partition, PartitionOutcome};

use userfs_hal::table::PARTTYPE_LINUX;
use userfs_hal::SECTOR_SIZE;

/// Type code the userfs data partition is created with.
pub const USERFS_PART_CODE: u8 = PARTTYPE_LINUX;

/// Sector gap reserved in front of every logical volume for its
/// descriptor. Fixed by the reference image layout, not derived from disk
/// geometry.
pub const LOGICAL_HEADER_SECTORS: u64 = 2048;

/// Minimum viable size for the userfs partition.
pub const USERFS_MIN_SIZE_BYTES: u64 = 1 << 30;
pub const USERFS_MIN_SECTORS: u64 = USERFS_MIN_SIZE_BYTES / SECTOR_SIZE;
