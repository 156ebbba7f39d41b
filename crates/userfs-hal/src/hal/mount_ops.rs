//! Mount and unmount primitives.

use crate::HalResult;
use std::path::Path;

pub trait MountOps {
    /// Mount `source` on `target`. `options` is the filesystem-specific
    /// data string (for overlays: `lowerdir=X,upperdir=Y,workdir=Z`).
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fstype: &str,
        options: Option<&str>,
    ) -> HalResult<()>;

    /// Lazily detach whatever is mounted on `target`. Unmounting a path
    /// with no mount reports `EINVAL`; callers decide whether that matters.
    fn unmount_detach(&self, target: &Path) -> HalResult<()>;

    /// Whether `path` is currently a mount point.
    fn is_mounted(&self, path: &Path) -> HalResult<bool>;
}
