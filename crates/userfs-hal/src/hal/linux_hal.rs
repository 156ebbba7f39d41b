//! Linux implementations backed by real system calls.

use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{
    BlockDevOps, CommandOutput, FilesystemInfo, FilesystemKind, MountOps, ProbeOps, ProcessOps,
    CAPTURE_BUF_SIZE,
};
use crate::error::{HalError, HalResult};

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxHal;

impl LinuxHal {
    pub fn new() -> Self {
        Self
    }
}

// BLKGETSIZE64: size of a block device in bytes.
nix::ioctl_read!(blkgetsize64, 0x12, 114, u64);

fn map_command_err(program: &str, err: io::Error) -> HalError {
    if err.kind() == io::ErrorKind::NotFound {
        return HalError::CommandNotFound(program.to_string());
    }
    HalError::Io(err)
}

fn run(program: &str, args: &[&str], capture: bool) -> HalResult<CommandOutput> {
    log::debug!("running command: {} {}", program, args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args);
    if capture {
        cmd.stdout(Stdio::piped());
    }

    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    let mut stdout = Vec::new();
    if let Some(mut pipe) = child.stdout.take() {
        let mut buf = [0u8; CAPTURE_BUF_SIZE];
        let mut filled = 0;
        loop {
            let n = pipe.read(&mut buf[filled..]).map_err(HalError::Io)?;
            if n == 0 {
                break;
            }
            filled += n;
            if filled == buf.len() {
                break;
            }
        }
        stdout.extend_from_slice(&buf[..filled]);
        // Closing the pipe here keeps a chatty tool from blocking on a
        // full pipe while we wait for it below.
        drop(pipe);
    }

    let status = child.wait().map_err(HalError::Io)?;
    Ok(CommandOutput {
        code: status.code(),
        stdout,
    })
}

impl ProcessOps for LinuxHal {
    fn command_status(&self, program: &str, args: &[&str]) -> HalResult<()> {
        let output = run(program, args, false)?;
        if output.code != Some(0) {
            return Err(HalError::CommandFailed {
                program: program.to_string(),
                code: output.code,
            });
        }
        Ok(())
    }

    fn command_output(&self, program: &str, args: &[&str]) -> HalResult<CommandOutput> {
        let output = run(program, args, true)?;
        if output.code != Some(0) {
            return Err(HalError::CommandFailed {
                program: program.to_string(),
                code: output.code,
            });
        }
        Ok(output)
    }
}

impl BlockDevOps for LinuxHal {
    fn device_size(&self, device: &Path) -> HalResult<u64> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|source| HalError::DeviceAccess {
                device: device.to_path_buf(),
                source,
            })?;

        let mut size: u64 = 0;
        unsafe { blkgetsize64(file.as_raw_fd(), &mut size) }.map_err(|errno| {
            HalError::DeviceAccess {
                device: device.to_path_buf(),
                source: io::Error::from_raw_os_error(errno as i32),
            }
        })?;
        Ok(size)
    }
}

impl ProbeOps for LinuxHal {
    fn probe_filesystem(&self, device: &Path) -> HalResult<FilesystemInfo> {
        let device_str = device.display().to_string();
        let output = run(
            "blkid",
            &["-s", "TYPE", "-s", "UUID", "-o", "export", &device_str],
            true,
        )?;

        match output.code {
            Some(0) => {}
            // blkid exits 2 when nothing was found; that device simply has
            // no filesystem yet.
            Some(2) => return Ok(FilesystemInfo::unknown()),
            code => {
                return Err(HalError::Probe {
                    device: device.to_path_buf(),
                    reason: format!("blkid exited with {:?}", code),
                })
            }
        }

        let text = String::from_utf8(output.stdout)?;
        Ok(parse_blkid_export(&text))
    }
}

fn parse_blkid_export(text: &str) -> FilesystemInfo {
    let mut info = FilesystemInfo::unknown();
    for line in text.lines() {
        if let Some(value) = line.strip_prefix("TYPE=") {
            info.kind = FilesystemKind::from_blkid(value.trim());
        } else if let Some(value) = line.strip_prefix("UUID=") {
            info.uuid = Some(value.trim().to_string());
        }
    }
    info
}

impl MountOps for LinuxHal {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fstype: &str,
        options: Option<&str>,
    ) -> HalResult<()> {
        nix::mount::mount(
            Some(source),
            target,
            Some(fstype),
            nix::mount::MsFlags::empty(),
            options,
        )
        .map_err(HalError::Nix)
    }

    fn unmount_detach(&self, target: &Path) -> HalResult<()> {
        nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH).map_err(HalError::Nix)
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        let content = fs::read_to_string("/proc/self/mountinfo")?;
        Ok(mountinfo_contains(&content, path))
    }
}

fn mountinfo_contains(content: &str, path: &Path) -> bool {
    parse_mountinfo(content).iter().any(|mp| mp == path)
}

fn parse_mountinfo(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .filter_map(|line| {
            let pre = line.split(" - ").next()?;
            let fields: Vec<&str> = pre.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            Some(PathBuf::from(unescape_mount_path(fields[4])))
        })
        .collect()
}

fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_output_captures_stdout() {
        let hal = LinuxHal::new();
        let output = hal.command_output("echo", &["hello"]).unwrap();
        assert_eq!(output.code, Some(0));
        assert_eq!(output.stdout, b"hello\n");
    }

    #[test]
    fn command_output_truncates_at_the_buffer_boundary() {
        let hal = LinuxHal::new();
        let byte_count = (2 * CAPTURE_BUF_SIZE).to_string();
        let output = hal
            .command_output("head", &["-c", &byte_count, "/dev/zero"])
            .unwrap();
        assert_eq!(output.stdout.len(), CAPTURE_BUF_SIZE);
    }

    #[test]
    fn command_status_reports_nonzero_exit() {
        let hal = LinuxHal::new();
        let err = hal.command_status("false", &[]).unwrap_err();
        assert!(matches!(
            err,
            HalError::CommandFailed { code: Some(1), .. }
        ));
    }

    #[test]
    fn missing_program_is_its_own_error() {
        let hal = LinuxHal::new();
        let err = hal
            .command_status("userfs-no-such-binary", &[])
            .unwrap_err();
        assert!(matches!(err, HalError::CommandNotFound(_)));
    }

    #[test]
    fn device_size_fails_on_a_missing_node() {
        let hal = LinuxHal::new();
        let err = hal
            .device_size(Path::new("/dev/userfs-does-not-exist"))
            .unwrap_err();
        assert!(matches!(err, HalError::DeviceAccess { .. }));
    }

    #[test]
    fn blkid_export_parses_type_and_uuid() {
        let info = parse_blkid_export(
            "DEVNAME=/dev/mmcblk0p3\nUUID=5af3e5e0-4c4f-4ded-b4a8-72557f6c9b52\nTYPE=btrfs\n",
        );
        assert_eq!(info.kind, FilesystemKind::Btrfs);
        assert_eq!(
            info.uuid.as_deref(),
            Some("5af3e5e0-4c4f-4ded-b4a8-72557f6c9b52")
        );
    }

    #[test]
    fn blkid_export_without_type_is_unknown() {
        let info = parse_blkid_export("DEVNAME=/dev/mmcblk0p3\n");
        assert_eq!(info.kind, FilesystemKind::Unknown);
        assert!(info.uuid.is_none());
    }

    #[test]
    fn mountinfo_extracts_mount_points() {
        let sample = "36 28 0:31 / / rw,relatime - ext4 /dev/sda3 rw\n\
                      37 28 0:32 / /mnt/data\\040disk rw,relatime - ext4 /dev/sda2 rw\n";
        assert!(mountinfo_contains(sample, Path::new("/")));
        assert!(mountinfo_contains(sample, Path::new("/mnt/data disk")));
        assert!(!mountinfo_contains(sample, Path::new("/mnt")));
    }
}
