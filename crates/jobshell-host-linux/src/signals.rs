//! Signal coordination
//!
//! Three handlers are installed:
//! - `SIGCHLD` sets the child-exit flag and nothing else
//! - `SIGUSR2` identifies the shell process on standard output
//! - `SIGSEGV` reports the fault on standard error and exits immediately
//!
//! The flag is the only state shared between handler context and the
//! control thread. The control thread reads and clears it at poll points.

use jobshell_host_api::{HostError, HostResult};
use nix::libc::{self, c_int};
use nix::sys::signal::{
    self, sigaction, sigprocmask, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};
use nix::unistd::getpid;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::sio;

/// Set from handler context when any child changes to the exited state
static CHILD_EXITED: AtomicBool = AtomicBool::new(false);

const IDENTIFY_PREFIX: &[u8] = b"Hi User! I am process ";
const FAULT_MESSAGE: &[u8] = b"Segmentation fault detected\n";

extern "C" fn on_child_exit(_signal: c_int) {
    CHILD_EXITED.store(true, Ordering::SeqCst);
}

extern "C" fn on_identify(_signal: c_int) {
    sio::write_all(libc::STDOUT_FILENO, IDENTIFY_PREFIX);
    sio::write_decimal(libc::STDOUT_FILENO, i64::from(getpid().as_raw()));
    sio::write_all(libc::STDOUT_FILENO, b"\n");
}

extern "C" fn on_fault(_signal: c_int) {
    sio::write_all(libc::STDERR_FILENO, FAULT_MESSAGE);
    // SAFETY: _exit is async-signal-safe and skips all user-space cleanup
    unsafe { libc::_exit(libc::EXIT_FAILURE) }
}

/// Install the child-exit, identification and fault handlers.
///
/// Safe to call more than once; later calls reinstall the same handlers.
pub fn install_handlers() -> HostResult<()> {
    install(Signal::SIGCHLD, on_child_exit, SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP)?;
    install(Signal::SIGUSR2, on_identify, SaFlags::SA_RESTART)?;
    install(Signal::SIGSEGV, on_fault, SaFlags::empty())?;
    debug!("Signal handlers installed");
    Ok(())
}

fn install(signal: Signal, handler: extern "C" fn(c_int), flags: SaFlags) -> HostResult<()> {
    let action = SigAction::new(SigHandler::Handler(handler), flags, SigSet::empty());
    // SAFETY: every handler above only touches an atomic or calls
    // async-signal-safe functions
    unsafe { sigaction(signal, &action) }
        .map(|_| ())
        .map_err(|e| HostError::SignalSetup(format!("{}: {}", signal, e)))
}

/// Read and clear the child-exit flag.
pub fn take_child_exit_flag() -> bool {
    CHILD_EXITED.swap(false, Ordering::SeqCst)
}

/// Blocks a set of signals for the calling thread until dropped.
///
/// Dropping restores the exact mask that was active at acquisition, so
/// guards nest: an inner full mask released inside an outer `SIGCHLD`
/// mask leaves `SIGCHLD` blocked.
#[derive(Debug)]
pub struct SignalMaskGuard {
    previous: SigSet,
}

impl SignalMaskGuard {
    pub fn block(set: &SigSet) -> HostResult<Self> {
        let mut previous = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_BLOCK, Some(set), Some(&mut previous))
            .map_err(|e| HostError::SignalSetup(format!("sigprocmask: {}", e)))?;
        Ok(Self { previous })
    }

    /// Block only the child-exit signal.
    pub fn child_exit() -> HostResult<Self> {
        Self::block(&child_exit_set())
    }

    /// Block every blockable signal.
    pub fn all() -> HostResult<Self> {
        Self::block(&SigSet::all())
    }
}

impl Drop for SignalMaskGuard {
    fn drop(&mut self) {
        let _ = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None);
    }
}

fn child_exit_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGCHLD);
    set
}

/// Unblock the child-exit signal in a freshly forked child.
///
/// The child inherits the parent's mask from inside the fork critical
/// section and must not exec with `SIGCHLD` blocked.
pub(crate) fn unblock_child_exit() {
    let _ = sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&child_exit_set()), None);
}

/// Give a freshly forked child the default `SIGPIPE` disposition.
///
/// The Rust runtime starts the shell with `SIGPIPE` ignored, and an ignored
/// signal stays ignored across exec.
pub(crate) fn restore_default_pipe_signal() {
    // SAFETY: SIG_DFL installs no handler code
    let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::fcntl::OFlag;
    use nix::sys::signal::raise;
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::{dup2, fork, pipe2, ForkResult};
    use serial_test::serial;
    use std::fs::File;
    use std::io::Read;
    use std::os::fd::{AsRawFd, RawFd};

    /// Fork a child that installs the handlers, points `stream` at a pipe and
    /// raises `signal`. Returns what the child wrote and how it ended.
    fn raise_in_child(stream: RawFd, signal: Signal) -> (String, WaitStatus) {
        let (read, write) = pipe2(OFlag::O_CLOEXEC).unwrap();
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let _ = install_handlers();
                let _ = dup2(write.as_raw_fd(), stream);
                let _ = raise(signal);
                unsafe { libc::_exit(0) }
            }
            ForkResult::Parent { child } => {
                drop(write);
                let mut output = String::new();
                File::from(read).read_to_string(&mut output).unwrap();
                let status = waitpid(child, None).unwrap();
                assert_eq!(status.pid(), Some(child));
                (output, status)
            }
        }
    }

    fn current_mask() -> SigSet {
        let mut mask = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_BLOCK, None, Some(&mut mask)).unwrap();
        mask
    }

    #[test]
    #[serial]
    fn child_exit_flag_is_set_by_handler_and_cleared_on_take() {
        install_handlers().unwrap();
        take_child_exit_flag();

        raise(Signal::SIGCHLD).unwrap();

        assert!(take_child_exit_flag());
        assert!(!take_child_exit_flag());
    }

    #[test]
    #[serial]
    fn blocked_signal_is_delivered_after_guard_drops() {
        install_handlers().unwrap();
        take_child_exit_flag();

        {
            let _guard = SignalMaskGuard::child_exit().unwrap();
            raise(Signal::SIGCHLD).unwrap();
            assert!(!take_child_exit_flag());
        }

        assert!(take_child_exit_flag());
    }

    #[test]
    #[serial]
    fn guards_nest() {
        assert!(!current_mask().contains(Signal::SIGCHLD));
        {
            let _child = SignalMaskGuard::child_exit().unwrap();
            {
                let _all = SignalMaskGuard::all().unwrap();
                assert!(current_mask().contains(Signal::SIGUSR2));
            }
            let mask = current_mask();
            assert!(mask.contains(Signal::SIGCHLD));
            assert!(!mask.contains(Signal::SIGUSR2));
        }
        assert!(!current_mask().contains(Signal::SIGCHLD));
    }

    #[test]
    #[serial]
    fn identify_handler_prints_pid() {
        let (output, status) = raise_in_child(libc::STDOUT_FILENO, Signal::SIGUSR2);

        let WaitStatus::Exited(child, code) = status else {
            panic!("child did not exit normally: {:?}", status);
        };
        assert_eq!(code, 0);
        assert_eq!(output, format!("Hi User! I am process {}\n", child));
    }

    #[test]
    #[serial]
    fn fault_handler_reports_and_exits() {
        let (output, status) = raise_in_child(libc::STDERR_FILENO, Signal::SIGSEGV);

        assert!(matches!(status, WaitStatus::Exited(_, libc::EXIT_FAILURE)));
        assert_eq!(output, "Segmentation fault detected\n");
    }
}
