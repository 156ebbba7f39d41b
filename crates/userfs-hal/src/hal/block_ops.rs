//! Raw block device queries.

use crate::HalResult;
use std::path::Path;

pub trait BlockDevOps {
    /// Size of a block device in bytes.
    ///
    /// The device is opened read-write, the same access the table writer
    /// needs later, so permission problems surface before any planning.
    fn device_size(&self, device: &Path) -> HalResult<u64>;
}
