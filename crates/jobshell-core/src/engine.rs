//! Job-control engine

use jobshell_api::{JobDescriptor, JobListing, Notice};
use jobshell_host_api::{ExitStatus, ProcessHost};
use std::io::Write;
use tracing::{debug, info, warn};

use crate::{BackgroundJob, BackgroundRegistry, CoreResult, DispatchResult, Executor};

/// The job-control core driven by the shell's control loop.
///
/// Owns the process host, the background registry and the stream that
/// receives `[pid] line` notices.
pub struct JobControl<H: ProcessHost, W: Write> {
    host: H,
    registry: BackgroundRegistry,
    notices: W,
    clock: fn() -> i64,
    last_status: Option<ExitStatus>,
}

impl<H: ProcessHost, W: Write> JobControl<H, W> {
    pub fn new(host: H, notices: W) -> Self {
        Self::with_clock(host, notices, jobshell_util::now_seconds)
    }

    /// Use `clock` for registration timestamps instead of the wall clock.
    pub fn with_clock(host: H, notices: W, clock: fn() -> i64) -> Self {
        info!("Job control initialized");
        Self {
            host,
            registry: BackgroundRegistry::new(),
            notices,
            clock,
            last_status: None,
        }
    }

    /// Run a job to completion in the foreground, or start it and track it
    /// in the background.
    pub fn dispatch(&mut self, job: JobDescriptor) -> CoreResult<DispatchResult> {
        let result = Executor::new(&mut self.host, &mut self.registry, self.clock).run(job)?;
        if let DispatchResult::Completed { status } = result {
            self.last_status = Some(status);
        }
        Ok(result)
    }

    /// Collect every exited child if the exit notification is set.
    ///
    /// Call once per control-loop cycle. The notification is cleared before
    /// the sweep, so a child exiting mid-sweep is picked up next cycle.
    /// Reaped pids with no registry entry (foreground stages already
    /// waited for) are ignored. Returns the number of entries removed.
    pub fn poll_and_reap(&mut self) -> CoreResult<usize> {
        if !self.host.take_exit_notification() {
            return Ok(0);
        }

        let mut removed = 0;
        while let Some((pid, status)) = self.host.reap_any()? {
            debug!(pid, %status, "Reaped child");
            if self.remove_by_pid(pid).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove the background job for `pid` and print its notice.
    ///
    /// An unknown pid is not an error; nothing changes and `None` is returned.
    pub fn remove_by_pid(&mut self, pid: u32) -> Option<JobListing> {
        let entry = {
            let _mask = self.mask_all();
            self.registry.remove_by_pid(pid)?
        };
        info!(pid, line = %entry.line(), "Background job removed");
        self.announce(&entry);
        Some(entry.listing())
    }

    /// Kill every remaining background job. Returns how many were drained.
    ///
    /// Each entry gets its notice and exactly one kill, whether or not the
    /// process had already exited.
    pub fn shutdown(&mut self) -> usize {
        let drained = {
            let _mask = self.mask_all();
            self.registry.drain_all()
        };

        for entry in &drained {
            self.announce(entry);
            if let Err(e) = self.host.kill(entry.pid()) {
                warn!(pid = entry.pid(), error = %e, "Failed to kill background job");
            }
        }

        info!(count = drained.len(), "Background jobs drained");
        drained.len()
    }

    pub fn list(&self) -> Vec<JobListing> {
        self.registry.list()
    }

    /// Status of the most recent foreground job, if any has run
    pub fn last_status(&self) -> Option<ExitStatus> {
        self.last_status
    }

    pub fn registry(&self) -> &BackgroundRegistry {
        &self.registry
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Stream receiving job notices
    pub fn notices(&self) -> &W {
        &self.notices
    }

    fn mask_all(&self) -> Option<H::MaskGuard> {
        match self.host.block_all() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!(error = %e, "Could not block signals around registry update");
                None
            }
        }
    }

    fn announce(&mut self, entry: &BackgroundJob) {
        if let Err(e) = Notice::new(entry.pid(), entry.line()).emit(&mut self.notices) {
            warn!(pid = entry.pid(), error = %e, "Failed to write job notice");
        }
    }
}
