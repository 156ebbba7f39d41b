//! Small filesystem and path helpers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;

/// Create `dir` if it does not exist. A path that exists but is not a
/// directory is an error.
pub fn create_directory(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {
            debug!("directory already exists: {}", dir.display());
            Ok(())
        }
        Ok(_) => bail!("path exists but is not a directory: {}", dir.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("creating directory: {}", dir.display());
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory: {}", dir.display()))
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to check directory: {}", dir.display()))
        }
    }
}

/// Device node of partition `slot` (0-based) on `disk`. Disks whose name
/// ends in a digit take a `p` infix (`/dev/mmcblk0p3`), the rest do not
/// (`/dev/sda3`).
pub fn partition_device_path(disk: &Path, slot: usize) -> PathBuf {
    let disk = disk.display().to_string();
    let partno = slot + 1;
    if disk.ends_with(|c: char| c.is_ascii_digit()) {
        PathBuf::from(format!("{}p{}", disk, partno))
    } else {
        PathBuf::from(format!("{}{}", disk, partno))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mmc_devices_take_a_p_infix() {
        assert_eq!(
            partition_device_path(Path::new("/dev/mmcblk0"), 2),
            PathBuf::from("/dev/mmcblk0p3")
        );
        assert_eq!(
            partition_device_path(Path::new("/dev/nvme0n1"), 0),
            PathBuf::from("/dev/nvme0n1p1")
        );
    }

    #[test]
    fn lettered_devices_append_the_number_directly() {
        assert_eq!(
            partition_device_path(Path::new("/dev/sda"), 2),
            PathBuf::from("/dev/sda3")
        );
    }

    #[test]
    fn create_directory_is_idempotent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a/b");

        create_directory(&target).unwrap();
        assert!(target.is_dir());
        create_directory(&target).unwrap();
    }

    #[test]
    fn create_directory_rejects_a_file_in_the_way() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("occupied");
        fs::write(&target, b"not a directory").unwrap();

        assert!(create_directory(&target).is_err());
    }
}
