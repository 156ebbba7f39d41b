//! Boundary layer between the userfs provisioning engine and the world.
//!
//! Everything that touches persistent or shared state sits behind a trait
//! here: the partition-table codec, block-device ioctls, filesystem probing,
//! external commands and mount syscalls. `MbrTable` and `LinuxHal` are the
//! real implementations; `MemoryTable` and `FakeHal` record operations
//! without executing them, for CI-safe testing without root privileges or
//! real hardware.

mod error;
pub mod hal;
pub mod table;

pub use error::{HalError, HalResult};
pub use hal::{
    BlockDevOps, CommandOutput, FakeHal, FilesystemInfo, FilesystemKind, LinuxHal, MountOps,
    Operation, ProbeOps, ProcessOps, CAPTURE_BUF_SIZE,
};
pub use table::{
    AddPartition, MbrTable, MemoryTable, SlotEntry, TableOp, TableOps, MAX_SLOTS, SECTOR_SIZE,
};

// Callers match mount errno values (EINVAL from a lazy detach of an
// unmounted path) without depending on nix themselves.
pub use nix::errno::Errno;
