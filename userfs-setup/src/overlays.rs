//! Writable overlay mounts for the managed system directories.
//!
//! Each managed directory keeps the read-only rootfs copy as the lower
//! layer and gets its upper and work directories inside one of the userfs
//! subvolumes.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use userfs_hal::{Errno, HalError, MountOps};

use crate::btrfs::Subvolume;
use crate::config::SetupConfig;
use crate::utils::create_directory;

struct OverlayMountPoint {
    lowerdir: &'static str,
    upper_name: &'static str,
    work_name: &'static str,
    mount_point: &'static str,
    subvolume: Subvolume,
}

static OVERLAY_MOUNT_POINTS: [OverlayMountPoint; 4] = [
    OverlayMountPoint {
        lowerdir: "/etc",
        upper_name: "etc",
        work_name: ".work.etc",
        mount_point: "/etc",
        subvolume: Subvolume::Config,
    },
    OverlayMountPoint {
        lowerdir: "/var",
        upper_name: "var",
        work_name: ".work.var",
        mount_point: "/var",
        subvolume: Subvolume::Data,
    },
    OverlayMountPoint {
        lowerdir: "/home",
        upper_name: "home",
        work_name: ".work.home",
        mount_point: "/home",
        subvolume: Subvolume::Data,
    },
    OverlayMountPoint {
        lowerdir: "/opt",
        upper_name: "opt",
        work_name: ".work.opt",
        mount_point: "/opt",
        subvolume: Subvolume::Data,
    },
];

fn overlay_mount_points() -> &'static [OverlayMountPoint] {
    if cfg!(feature = "overlay-opt") {
        &OVERLAY_MOUNT_POINTS
    } else {
        &OVERLAY_MOUNT_POINTS[..3]
    }
}

/// Mount writable overlays for every managed directory.
pub fn setup_overlays<H: MountOps>(hal: &H, cfg: &SetupConfig) -> Result<()> {
    // /var/volatile is a tmpfs from the read-only image; it has to move out
    // of the way before /var itself is overlaid, and comes back afterwards.
    detach_quietly(hal, Path::new("/var/volatile"));

    for mp in overlay_mount_points() {
        let subvolume_root = mp.subvolume.path(&cfg.mount_root);
        let upper_dir = subvolume_root.join(mp.upper_name);
        let work_dir = subvolume_root.join(mp.work_name);

        debug!(
            "creating overlay directories: upper={} work={}",
            upper_dir.display(),
            work_dir.display()
        );
        create_directory(&upper_dir)?;
        create_directory(&work_dir)?;

        detach_quietly(hal, Path::new(mp.mount_point));

        let options = format!(
            "lowerdir={},upperdir={},workdir={}",
            mp.lowerdir,
            upper_dir.display(),
            work_dir.display()
        );
        info!(
            "mounting overlay on {} with options: {}",
            mp.mount_point, options
        );
        hal.mount(
            Path::new("overlay"),
            Path::new(mp.mount_point),
            "overlay",
            Some(&options),
        )
        .with_context(|| format!("failed to mount overlay on {}", mp.mount_point))?;
    }

    info!("mounting tmpfs on /var/volatile");
    hal.mount(
        Path::new("tmpfs"),
        Path::new("/var/volatile"),
        "tmpfs",
        Some("mode=0755"),
    )
    .context("failed to mount /var/volatile")?;

    Ok(())
}

/// Lazy-detach `target` if something is mounted there. A path with no
/// mount (EINVAL) is the normal case on first boot; anything else is
/// logged and ignored so a half-torn-down state does not block boot.
fn detach_quietly<H: MountOps>(hal: &H, target: &Path) {
    match hal.unmount_detach(target) {
        Ok(()) => debug!("unmounted {}", target.display()),
        Err(HalError::Nix(Errno::EINVAL)) => {}
        Err(err) => warn!(
            "failed to unmount {}: {}, continuing anyway",
            target.display(),
            err
        ),
    }
}
