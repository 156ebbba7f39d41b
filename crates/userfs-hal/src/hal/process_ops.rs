//! External command execution.
//!
//! Commands are world-touching and go through this trait so workflows can
//! be tested without spawning real processes. Execution is strictly
//! synchronous: spawn, optionally take one bounded read of stdout, then
//! block until exit. There are no timeouts; a hung tool hangs the run.

use crate::HalResult;

/// Upper bound for captured stdout. Output past the buffer is dropped
/// silently and a short read is not an error.
pub const CAPTURE_BUF_SIZE: usize = 4096;

/// Exit state and captured output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process died on a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
}

pub trait ProcessOps {
    /// Run a command to completion; non-zero exit is an error.
    fn command_status(&self, program: &str, args: &[&str]) -> HalResult<()>;

    /// Run a command to completion with bounded stdout capture; non-zero
    /// exit is an error.
    fn command_output(&self, program: &str, args: &[&str]) -> HalResult<CommandOutput>;
}
