//! Fake HAL implementation for testing.
//!
//! Records every operation without executing it, so provisioning flows can
//! run in CI without root privileges or real hardware. Device sizes and
//! probe results are scripted per device path.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{
    BlockDevOps, CommandOutput, FilesystemInfo, MountOps, ProbeOps, ProcessOps,
};
use crate::error::{HalError, HalResult};

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    DeviceSize {
        device: PathBuf,
    },
    ProbeFilesystem {
        device: PathBuf,
    },
    Command {
        program: String,
        args: Vec<String>,
    },
    Mount {
        source: PathBuf,
        target: PathBuf,
        fstype: String,
        options: Option<String>,
    },
    UnmountDetach {
        target: PathBuf,
    },
}

#[derive(Debug, Default)]
struct FakeHalState {
    operations: Vec<Operation>,
    mounted: HashSet<PathBuf>,
    device_sizes: HashMap<PathBuf, u64>,
    probe_results: HashMap<PathBuf, FilesystemInfo>,
}

/// Fake HAL that records operations instead of executing them.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded operations, in call order.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations.len()
    }

    /// Whether any recorded operation matches `check`.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state.lock().unwrap().operations.iter().any(check)
    }

    /// Script the byte size reported for `device`.
    pub fn set_device_size(&self, device: impl Into<PathBuf>, bytes: u64) {
        self.state
            .lock()
            .unwrap()
            .device_sizes
            .insert(device.into(), bytes);
    }

    /// Script the probe result for `device`. Unscripted devices probe as
    /// unknown.
    pub fn set_probe_result(&self, device: impl Into<PathBuf>, info: FilesystemInfo) {
        self.state
            .lock()
            .unwrap()
            .probe_results
            .insert(device.into(), info);
    }

    /// Pre-mark `path` as mounted.
    pub fn set_mounted(&self, path: impl Into<PathBuf>) {
        self.state.lock().unwrap().mounted.insert(path.into());
    }

    fn record(&self, op: Operation) {
        self.state.lock().unwrap().operations.push(op);
    }
}

impl BlockDevOps for FakeHal {
    fn device_size(&self, device: &Path) -> HalResult<u64> {
        self.record(Operation::DeviceSize {
            device: device.to_path_buf(),
        });
        self.state
            .lock()
            .unwrap()
            .device_sizes
            .get(device)
            .copied()
            .ok_or_else(|| HalError::DeviceAccess {
                device: device.to_path_buf(),
                source: io::Error::from(io::ErrorKind::NotFound),
            })
    }
}

impl ProbeOps for FakeHal {
    fn probe_filesystem(&self, device: &Path) -> HalResult<FilesystemInfo> {
        self.record(Operation::ProbeFilesystem {
            device: device.to_path_buf(),
        });
        Ok(self
            .state
            .lock()
            .unwrap()
            .probe_results
            .get(device)
            .cloned()
            .unwrap_or_else(FilesystemInfo::unknown))
    }
}

impl ProcessOps for FakeHal {
    fn command_status(&self, program: &str, args: &[&str]) -> HalResult<()> {
        self.record(Operation::Command {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        });
        Ok(())
    }

    fn command_output(&self, program: &str, args: &[&str]) -> HalResult<CommandOutput> {
        self.command_status(program, args)?;
        Ok(CommandOutput {
            code: Some(0),
            stdout: Vec::new(),
        })
    }
}

impl MountOps for FakeHal {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fstype: &str,
        options: Option<&str>,
    ) -> HalResult<()> {
        self.record(Operation::Mount {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.to_string(),
            options: options.map(String::from),
        });
        self.state
            .lock()
            .unwrap()
            .mounted
            .insert(target.to_path_buf());
        Ok(())
    }

    fn unmount_detach(&self, target: &Path) -> HalResult<()> {
        self.record(Operation::UnmountDetach {
            target: target.to_path_buf(),
        });
        if !self.state.lock().unwrap().mounted.remove(target) {
            // Nothing mounted there, same errno the kernel would give.
            return Err(HalError::Nix(nix::errno::Errno::EINVAL));
        }
        Ok(())
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        Ok(self.state.lock().unwrap().mounted.contains(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::FilesystemKind;

    #[test]
    fn records_mount_and_tracks_state() {
        let hal = FakeHal::new();
        let target = Path::new("/mnt/test");

        hal.mount(Path::new("/dev/sda1"), target, "ext4", None)
            .unwrap();

        assert!(hal.is_mounted(target).unwrap());
        assert!(hal.has_operation(|op| matches!(op, Operation::Mount { .. })));

        hal.unmount_detach(target).unwrap();
        assert!(!hal.is_mounted(target).unwrap());
    }

    #[test]
    fn unmount_of_an_unmounted_path_is_einval() {
        let hal = FakeHal::new();
        let err = hal.unmount_detach(Path::new("/mnt/none")).unwrap_err();
        assert!(matches!(err, HalError::Nix(nix::errno::Errno::EINVAL)));
    }

    #[test]
    fn probe_results_are_scripted() {
        let hal = FakeHal::new();
        hal.set_probe_result(
            "/dev/sda3",
            FilesystemInfo {
                kind: FilesystemKind::Btrfs,
                uuid: Some("abc".to_string()),
            },
        );

        let info = hal.probe_filesystem(Path::new("/dev/sda3")).unwrap();
        assert_eq!(info.kind, FilesystemKind::Btrfs);

        let unknown = hal.probe_filesystem(Path::new("/dev/sda4")).unwrap();
        assert_eq!(unknown.kind, FilesystemKind::Unknown);
    }

    #[test]
    fn device_sizes_are_scripted() {
        let hal = FakeHal::new();
        hal.set_device_size("/dev/sda", 1 << 30);

        assert_eq!(hal.device_size(Path::new("/dev/sda")).unwrap(), 1 << 30);
        assert!(hal.device_size(Path::new("/dev/sdb")).is_err());
    }

    #[test]
    fn commands_are_recorded_with_arguments() {
        let hal = FakeHal::new();
        hal.command_status("mkfs.btrfs", &["-f", "/dev/sda3"]).unwrap();

        assert_eq!(
            hal.operations(),
            vec![Operation::Command {
                program: "mkfs.btrfs".to_string(),
                args: vec!["-f".to_string(), "/dev/sda3".to_string()],
            }]
        );
    }
}
