use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type HalResult<T> = std::result::Result<T, HalError>;

#[derive(Error, Debug)]
pub enum HalError {
    #[error("cannot access device {device}: {source}")]
    DeviceAccess {
        device: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no usable DOS disklabel on {device}: {reason}")]
    UnsupportedTableType { device: PathBuf, reason: String },

    #[error("partition slot {0} is not in use")]
    SlotNotFound(usize),

    #[error("partition slot {0} is already in use")]
    SlotInUse(usize),

    #[error("failed to write disklabel to {device}: {reason}")]
    Commit { device: PathBuf, reason: String },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command failed: {program} (exit={code:?})")]
    CommandFailed { program: String, code: Option<i32> },

    #[error("filesystem probe failed on {device}: {reason}")]
    Probe { device: PathBuf, reason: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("nix errno: {0}")]
    Nix(#[from] nix::errno::Errno),

    #[error("UTF-8 decode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
