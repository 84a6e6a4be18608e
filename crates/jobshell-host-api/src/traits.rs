//! Process host trait

use jobshell_api::{ProcessDescriptor, Redirections};
use std::os::fd::RawFd;
use thiserror::Error;

use crate::ExitStatus;

/// Errors from host operations.
///
/// Every variant surfacing on the parent side is fatal to the shell: once a
/// fork, pipe or wait fails mid-dispatch the pipeline bookkeeping cannot be
/// unwound safely.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Fork failed: {0}")]
    ForkFailed(String),

    #[error("Pipe creation failed: {0}")]
    PipeFailed(String),

    #[error("Close of descriptor {fd} failed: {reason}")]
    CloseFailed { fd: RawFd, reason: String },

    #[error("Wait for pid {pid} failed: {reason}")]
    WaitFailed { pid: u32, reason: String },

    #[error("Reap sweep failed: {0}")]
    ReapFailed(String),

    #[error("Kill of pid {pid} failed: {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("Signal setup failed: {0}")]
    SignalSetup(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Both ends of an OS pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipe {
    pub read: RawFd,
    pub write: RawFd,
}

/// Everything the child side of a fork needs to become one stage.
#[derive(Debug, Clone)]
pub struct StagePlan<'a> {
    pub process: &'a ProcessDescriptor,

    /// Descriptor to rebind onto standard input; `None` inherits the shell's
    pub stdin: Option<RawFd>,

    /// Descriptor to rebind onto standard output; `None` inherits the shell's
    pub stdout: Option<RawFd>,

    /// Descriptors the child must close before exec
    pub close_in_child: Vec<RawFd>,

    /// File redirection, single-stage jobs only
    pub redirections: Option<Redirections>,
}

impl<'a> StagePlan<'a> {
    /// A stage that inherits all three standard streams.
    pub fn inherit(process: &'a ProcessDescriptor) -> Self {
        Self {
            process,
            stdin: None,
            stdout: None,
            close_in_child: Vec::new(),
            redirections: None,
        }
    }
}

/// OS process operations used by the job-control core.
///
/// Implementations are driven from a single control thread. Signal handlers
/// never call into a host; the only state they share with it is the
/// child-exit notification read by [`ProcessHost::take_exit_notification`].
pub trait ProcessHost {
    /// Restores the signal mask that was active before it was acquired.
    type MaskGuard;

    /// Block the child-exit signal until the guard is dropped.
    fn block_child_exit(&self) -> HostResult<Self::MaskGuard>;

    /// Block every blockable signal until the guard is dropped.
    fn block_all(&self) -> HostResult<Self::MaskGuard>;

    fn open_pipe(&mut self) -> HostResult<Pipe>;

    fn close(&mut self, fd: RawFd) -> HostResult<()>;

    /// Fork a child that becomes the described stage.
    ///
    /// Returns the child's pid in the parent. The child never returns from
    /// this call: it either replaces its image or exits with the reserved
    /// failure status.
    fn spawn(&mut self, plan: &StagePlan<'_>) -> HostResult<u32>;

    /// Block until the given child exits.
    fn wait(&mut self, pid: u32) -> HostResult<ExitStatus>;

    /// Collect one exited child without blocking, if there is one.
    fn reap_any(&mut self) -> HostResult<Option<(u32, ExitStatus)>>;

    /// Forcibly terminate a child. A process that is already gone is not an error.
    fn kill(&mut self, pid: u32) -> HostResult<()>;

    /// Read and clear the "a child exited" notification.
    fn take_exit_notification(&self) -> bool;
}
