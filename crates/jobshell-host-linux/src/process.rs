//! Process management: fork, exec, pipes, wait, reap, kill

use jobshell_host_api::{ExitStatus, HostError, HostResult, Pipe, ProcessHost, StagePlan};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, execvp, fork, pipe2, ForkResult, Pid};
use std::ffi::CString;
use std::os::fd::{IntoRawFd, RawFd};
use tracing::{debug, info, warn};

use crate::redirect::{apply_redirections, rebind, validate_distinct_targets};
use crate::signals::{self, SignalMaskGuard};
use crate::sio;

/// POSIX process host.
///
/// Constructing one installs the signal handlers. Children that fail before
/// running their command exit with `failure_status`.
#[derive(Debug)]
pub struct LinuxHost {
    failure_status: i32,
}

impl LinuxHost {
    pub fn new(failure_status: i32) -> HostResult<Self> {
        if !(1..=255).contains(&failure_status) {
            return Err(HostError::InvalidArgument(format!(
                "child failure status must be in 1..=255, got {}",
                failure_status
            )));
        }
        signals::install_handlers()?;
        info!(failure_status, "Linux process host initialized");
        Ok(Self { failure_status })
    }

    pub fn failure_status(&self) -> i32 {
        self.failure_status
    }
}

impl ProcessHost for LinuxHost {
    type MaskGuard = SignalMaskGuard;

    fn block_child_exit(&self) -> HostResult<SignalMaskGuard> {
        SignalMaskGuard::child_exit()
    }

    fn block_all(&self) -> HostResult<SignalMaskGuard> {
        SignalMaskGuard::all()
    }

    fn open_pipe(&mut self) -> HostResult<Pipe> {
        // Close-on-exec keeps stray pipe ends out of unrelated children;
        // descriptors rebound with dup2 lose the flag and survive exec.
        let (read, write) =
            pipe2(OFlag::O_CLOEXEC).map_err(|e| HostError::PipeFailed(e.to_string()))?;
        let pipe = Pipe {
            read: read.into_raw_fd(),
            write: write.into_raw_fd(),
        };
        debug!(read = pipe.read, write = pipe.write, "Pipe opened");
        Ok(pipe)
    }

    fn close(&mut self, fd: RawFd) -> HostResult<()> {
        close(fd).map_err(|e| HostError::CloseFailed {
            fd,
            reason: e.to_string(),
        })
    }

    fn spawn(&mut self, plan: &StagePlan<'_>) -> HostResult<u32> {
        // SAFETY: the child only rebinds descriptors and execs or exits
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                debug!(pid = child.as_raw(), command = %plan.process.command(), "Stage spawned");
                Ok(child.as_raw() as u32)
            }
            Ok(ForkResult::Child) => become_stage(plan, self.failure_status),
            Err(e) => Err(HostError::ForkFailed(e.to_string())),
        }
    }

    fn wait(&mut self, pid: u32) -> HostResult<ExitStatus> {
        let target = Pid::from_raw(pid as i32);
        loop {
            match waitpid(target, None) {
                Ok(status) => {
                    if let Some((_, exit)) = decode(status) {
                        debug!(pid, status = %exit, "Child waited");
                        return Ok(exit);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    return Err(HostError::WaitFailed {
                        pid,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    fn reap_any(&mut self) -> HostResult<Option<(u32, ExitStatus)>> {
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => return Ok(None),
                Ok(status) => {
                    if let Some(reaped) = decode(status) {
                        return Ok(Some(reaped));
                    }
                }
                Err(Errno::ECHILD) => return Ok(None),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(HostError::ReapFailed(e.to_string())),
            }
        }
    }

    fn kill(&mut self, pid: u32) -> HostResult<()> {
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) => {
                debug!(pid, "Sent SIGKILL");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                // Process already gone
                Ok(())
            }
            Err(e) => Err(HostError::KillFailed {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    fn take_exit_notification(&self) -> bool {
        signals::take_child_exit_flag()
    }
}

/// Map a terminal wait status to `(pid, status)`; non-terminal states yield `None`.
fn decode(status: WaitStatus) -> Option<(u32, ExitStatus)> {
    match status {
        WaitStatus::Exited(pid, code) => Some((pid.as_raw() as u32, ExitStatus::with_code(code))),
        WaitStatus::Signaled(pid, signal, _) => {
            Some((pid.as_raw() as u32, ExitStatus::signaled(signal as i32)))
        }
        other => {
            warn!(status = ?other, "Ignoring non-terminal wait status");
            None
        }
    }
}

/// Child side of `spawn`. Never returns.
fn become_stage(plan: &StagePlan<'_>, failure_status: i32) -> ! {
    signals::unblock_child_exit();
    signals::restore_default_pipe_signal();

    if let Some(redirections) = &plan.redirections {
        if let Err(e) = validate_distinct_targets(redirections).and_then(|_| apply_redirections(redirections)) {
            child_fail(&e.to_string(), failure_status);
        }
    }

    let streams = [(plan.stdin, libc::STDIN_FILENO), (plan.stdout, libc::STDOUT_FILENO)];
    for (fd, target) in streams {
        if let Some(fd) = fd {
            if let Err(e) = rebind(fd, target) {
                child_fail(&e.to_string(), failure_status);
            }
        }
    }

    for &fd in &plan.close_in_child {
        let _ = close(fd);
    }

    let command = plan.process.command();
    let program = CString::new(command);
    let argv: Result<Vec<CString>, _> = plan
        .process
        .argv()
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect();

    if let (Ok(program), Ok(argv)) = (program, argv) {
        // Only returns on failure
        let _ = execvp(&program, &argv);
    }

    child_fail(&format!("{}: command not found", command), failure_status)
}

/// Report one diagnostic line on the inherited stderr and exit.
fn child_fail(message: &str, failure_status: i32) -> ! {
    sio::write_all(libc::STDERR_FILENO, message.as_bytes());
    sio::write_all(libc::STDERR_FILENO, b"\n");
    // SAFETY: _exit skips atexit handlers and stdio flushing that belong to the shell
    unsafe { libc::_exit(failure_status) }
}
