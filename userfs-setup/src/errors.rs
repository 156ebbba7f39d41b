use thiserror::Error;
use userfs_hal::HalError;

/// Result type alias for provisioning operations.
pub type Result<T> = anyhow::Result<T>;

#[derive(Error, Debug)]
pub enum UserfsError {
    #[error(transparent)]
    Hal(#[from] HalError),

    #[error("not enough free space for the userfs partition: {free_sectors} sectors free, {required} required")]
    InsufficientSpace { free_sectors: u64, required: u64 },

    #[error("unsupported userfs partition slot {0}")]
    UnsupportedSlot(usize),

    #[error("partition plan inconsistency: {0}")]
    PlanConsistency(String),
}
