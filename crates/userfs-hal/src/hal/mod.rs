//! System operation traits and their implementations.
//!
//! Each concern the provisioning steps touch gets its own small trait, with
//! a real implementation (`LinuxHal`) and a recording fake (`FakeHal`).

pub mod block_ops;
pub mod fake_hal;
pub mod linux_hal;
pub mod mount_ops;
pub mod probe_ops;
pub mod process_ops;

pub use block_ops::BlockDevOps;
pub use fake_hal::{FakeHal, Operation};
pub use linux_hal::LinuxHal;
pub use mount_ops::MountOps;
pub use probe_ops::{FilesystemInfo, FilesystemKind, ProbeOps};
pub use process_ops::{CommandOutput, ProcessOps, CAPTURE_BUF_SIZE};
