//! Mock process host for testing

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{ExitStatus, HostError, HostResult, Pipe, ProcessHost, StagePlan};

/// First fake descriptor handed out by the mock
const FIRST_FAKE_FD: RawFd = 100;

/// First fake pid handed out by the mock
const FIRST_FAKE_PID: u32 = 1000;

/// Which signals a mask acquisition blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    ChildExit,
    All,
}

/// One recorded call into the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Mask(MaskKind),
    Unmask(MaskKind),
    OpenPipe(Pipe),
    Close(RawFd),
    Spawn(SpawnRecord),
    Wait(u32),
    Reap(u32),
    Kill(u32),
}

/// What the executor asked a spawned stage to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRecord {
    pub pid: u32,
    pub command: String,
    pub stdin: Option<RawFd>,
    pub stdout: Option<RawFd>,
    pub close_in_child: Vec<RawFd>,
    pub redirected: bool,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<HostCall>,
    next_fd: RawFd,
    next_pid: u32,
    open_fds: BTreeSet<RawFd>,
    /// Children that have not been waited for or reaped
    live: HashMap<u32, String>,
    /// Children that exited and are waiting to be reaped, in exit order
    exited: VecDeque<(u32, ExitStatus)>,
    /// Status a command reports when waited for; defaults to success
    statuses: HashMap<String, ExitStatus>,
    mask_depth: usize,
    notified: bool,
    fail_fork: bool,
    fail_pipe: bool,
    fail_wait: bool,
}

/// In-memory process host.
///
/// Cloning shares state, so a test can keep a handle while the core owns the
/// host. Spawned children stay "running" until [`MockHost::finish`] is
/// called or they are waited for.
#[derive(Debug, Clone)]
pub struct MockHost {
    state: Arc<Mutex<MockState>>,
}

/// Guard returned by the mock's masking calls
#[derive(Debug)]
pub struct MockMaskGuard {
    kind: MaskKind,
    state: Arc<Mutex<MockState>>,
}

impl Drop for MockMaskGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.mask_depth = state.mask_depth.saturating_sub(1);
        state.calls.push(HostCall::Unmask(self.kind));
    }
}

fn lock(state: &Arc<Mutex<MockState>>) -> MutexGuard<'_, MockState> {
    // A panicking test must not poison the handle used by the next assertion
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_fd: FIRST_FAKE_FD,
                next_pid: FIRST_FAKE_PID,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    /// Make waits on children running `command` report `status`.
    pub fn set_status(&self, command: impl Into<String>, status: ExitStatus) {
        self.state().statuses.insert(command.into(), status);
    }

    pub fn set_fail_fork(&self, fail: bool) {
        self.state().fail_fork = fail;
    }

    pub fn set_fail_pipe(&self, fail: bool) {
        self.state().fail_pipe = fail;
    }

    pub fn set_fail_wait(&self, fail: bool) {
        self.state().fail_wait = fail;
    }

    /// Simulate a child exiting on its own: it becomes reapable and the
    /// exit notification is raised, as the signal handler would.
    pub fn finish(&self, pid: u32, status: ExitStatus) {
        let mut state = self.state();
        if state.live.remove(&pid).is_some() {
            state.exited.push_back((pid, status));
        }
        state.notified = true;
    }

    /// Raise the exit notification without any child exiting.
    pub fn notify(&self) {
        self.state().notified = true;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    pub fn spawns(&self) -> Vec<SpawnRecord> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Spawn(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn pipes_opened(&self) -> usize {
        self.count(|c| matches!(c, HostCall::OpenPipe(_)))
    }

    pub fn waits(&self) -> Vec<u32> {
        self.filter_pids(|c| match c {
            HostCall::Wait(pid) => Some(*pid),
            _ => None,
        })
    }

    pub fn kills(&self) -> Vec<u32> {
        self.filter_pids(|c| match c {
            HostCall::Kill(pid) => Some(*pid),
            _ => None,
        })
    }

    /// Pipe ends that were opened and never closed
    pub fn open_fds(&self) -> Vec<RawFd> {
        self.state().open_fds.iter().copied().collect()
    }

    /// Number of masks currently held
    pub fn mask_depth(&self) -> usize {
        self.state().mask_depth
    }

    pub fn is_running(&self, pid: u32) -> bool {
        self.state().live.contains_key(&pid)
    }

    fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    fn filter_pids(&self, f: impl Fn(&HostCall) -> Option<u32>) -> Vec<u32> {
        self.state().calls.iter().filter_map(f).collect()
    }

    fn mask(&self, kind: MaskKind) -> MockMaskGuard {
        let mut state = self.state();
        state.mask_depth += 1;
        state.calls.push(HostCall::Mask(kind));
        MockMaskGuard {
            kind,
            state: self.state.clone(),
        }
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHost for MockHost {
    type MaskGuard = MockMaskGuard;

    fn block_child_exit(&self) -> HostResult<MockMaskGuard> {
        Ok(self.mask(MaskKind::ChildExit))
    }

    fn block_all(&self) -> HostResult<MockMaskGuard> {
        Ok(self.mask(MaskKind::All))
    }

    fn open_pipe(&mut self) -> HostResult<Pipe> {
        let mut state = self.state();
        if state.fail_pipe {
            return Err(HostError::PipeFailed("Mock pipe failure".into()));
        }
        let pipe = Pipe {
            read: state.next_fd,
            write: state.next_fd + 1,
        };
        state.next_fd += 2;
        state.open_fds.insert(pipe.read);
        state.open_fds.insert(pipe.write);
        state.calls.push(HostCall::OpenPipe(pipe));
        Ok(pipe)
    }

    fn close(&mut self, fd: RawFd) -> HostResult<()> {
        let mut state = self.state();
        if !state.open_fds.remove(&fd) {
            return Err(HostError::CloseFailed {
                fd,
                reason: "descriptor not open".into(),
            });
        }
        state.calls.push(HostCall::Close(fd));
        Ok(())
    }

    fn spawn(&mut self, plan: &StagePlan<'_>) -> HostResult<u32> {
        let mut state = self.state();
        if state.fail_fork {
            return Err(HostError::ForkFailed("Mock fork failure".into()));
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        let command = plan.process.command().to_string();
        state.live.insert(pid, command.clone());
        state.calls.push(HostCall::Spawn(SpawnRecord {
            pid,
            command,
            stdin: plan.stdin,
            stdout: plan.stdout,
            close_in_child: plan.close_in_child.clone(),
            redirected: plan.redirections.is_some(),
        }));
        Ok(pid)
    }

    fn wait(&mut self, pid: u32) -> HostResult<ExitStatus> {
        let mut state = self.state();
        state.calls.push(HostCall::Wait(pid));
        if state.fail_wait {
            return Err(HostError::WaitFailed {
                pid,
                reason: "Mock wait failure".into(),
            });
        }
        if let Some(command) = state.live.remove(&pid) {
            let status = state
                .statuses
                .get(&command)
                .copied()
                .unwrap_or_else(ExitStatus::success);
            // The real kernel raises SIGCHLD for foreground children too
            state.notified = true;
            return Ok(status);
        }
        if let Some(index) = state.exited.iter().position(|(p, _)| *p == pid) {
            if let Some((_, status)) = state.exited.remove(index) {
                return Ok(status);
            }
        }
        Err(HostError::WaitFailed {
            pid,
            reason: "no such child".into(),
        })
    }

    fn reap_any(&mut self) -> HostResult<Option<(u32, ExitStatus)>> {
        let mut state = self.state();
        let reaped = state.exited.pop_front();
        if let Some((pid, _)) = reaped {
            state.calls.push(HostCall::Reap(pid));
        }
        Ok(reaped)
    }

    fn kill(&mut self, pid: u32) -> HostResult<()> {
        let mut state = self.state();
        state.calls.push(HostCall::Kill(pid));
        if state.live.remove(&pid).is_some() {
            state.exited.push_back((pid, ExitStatus::signaled(9)));
        }
        Ok(())
    }

    fn take_exit_notification(&self) -> bool {
        std::mem::take(&mut self.state().notified)
    }
}
