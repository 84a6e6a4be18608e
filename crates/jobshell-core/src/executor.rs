//! Pipeline and process executor
//!
//! A job ends in one of two states: `Completed` after its foreground stages
//! were waited for, or `Registered` once its first stage is tracked in the
//! background registry.
//!
//! Every fork happens with the child-exit signal blocked, and a background
//! pid is recorded before that mask is released. Registry insertion itself
//! runs with every signal blocked.

use jobshell_api::JobDescriptor;
use jobshell_host_api::{ExitStatus, ProcessHost, StagePlan};
use std::os::fd::RawFd;
use tracing::{debug, info};

use crate::{BackgroundJob, BackgroundRegistry, CoreResult};

/// Terminal state of a dispatched job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    /// Foreground job finished; `status` is that of the last waited stage
    Completed { status: ExitStatus },

    /// Background job is tracked under its first stage's pid
    Registered { pid: u32 },
}

/// Runs one job against a host and the registry that tracks its background jobs.
pub struct Executor<'a, H: ProcessHost> {
    host: &'a mut H,
    registry: &'a mut BackgroundRegistry,
    clock: fn() -> i64,
}

impl<'a, H: ProcessHost> Executor<'a, H> {
    pub fn new(host: &'a mut H, registry: &'a mut BackgroundRegistry, clock: fn() -> i64) -> Self {
        Self {
            host,
            registry,
            clock,
        }
    }

    pub fn run(&mut self, job: JobDescriptor) -> CoreResult<DispatchResult> {
        debug!(
            stages = job.stage_count(),
            background = job.is_background(),
            line = %job.line(),
            "Dispatching job"
        );
        if job.is_pipeline() {
            self.run_pipeline(job)
        } else {
            self.run_single(job)
        }
    }

    fn run_single(&mut self, job: JobDescriptor) -> CoreResult<DispatchResult> {
        let plan = StagePlan {
            redirections: Some(job.redirections()),
            ..StagePlan::inherit(job.first_stage())
        };

        let mask = self.host.block_child_exit()?;
        let pid = self.host.spawn(&plan)?;

        if job.is_background() {
            self.register(pid, job)?;
            drop(mask);
            return Ok(DispatchResult::Registered { pid });
        }

        drop(mask);
        let status = self.host.wait(pid)?;
        debug!(pid, %status, "Foreground job finished");
        Ok(DispatchResult::Completed { status })
    }

    /// Chain `N` stages through `N - 1` pipes.
    ///
    /// Job-level redirection is not applied to pipelines. Only stage 0 of a
    /// background pipeline is registered; every later stage is waited for.
    fn run_pipeline(&mut self, job: JobDescriptor) -> CoreResult<DispatchResult> {
        let last = job.stage_count() - 1;
        let mut upstream: Option<RawFd> = None;
        let mut registered = None;
        let mut status = ExitStatus::success();

        for (index, process) in job.pipeline().iter().enumerate() {
            let pipe = if index < last {
                Some(self.host.open_pipe()?)
            } else {
                None
            };

            let plan = StagePlan {
                process,
                stdin: upstream,
                stdout: pipe.map(|p| p.write),
                // Our own read end is the next stage's business
                close_in_child: pipe.map(|p| p.read).into_iter().collect(),
                redirections: None,
            };

            let background_head = index == 0 && job.is_background();
            let pid = {
                let _mask = self.host.block_child_exit()?;
                let pid = self.host.spawn(&plan)?;
                if background_head {
                    // Remaining stages are still spawned from `job`
                    self.register(pid, job.clone())?;
                    registered = Some(pid);
                }
                pid
            };

            if let Some(fd) = upstream.take() {
                self.host.close(fd)?;
            }
            if let Some(pipe) = pipe {
                self.host.close(pipe.write)?;
                upstream = Some(pipe.read);
            }

            if !background_head {
                status = self.host.wait(pid)?;
                debug!(pid, stage = index, %status, "Pipeline stage finished");
            }
        }

        Ok(match registered {
            Some(pid) => DispatchResult::Registered { pid },
            None => DispatchResult::Completed { status },
        })
    }

    fn register(&mut self, pid: u32, job: JobDescriptor) -> CoreResult<()> {
        let _mask = self.host.block_all()?;
        let started_at = (self.clock)();
        info!(pid, started_at, line = %job.line(), "Background job registered");
        self.registry
            .insert_in_order(BackgroundJob::new(pid, started_at, job))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;
    use jobshell_api::ProcessDescriptor;
    use jobshell_host_api::{HostCall, HostError, MaskKind, MockHost};

    fn fixed_clock() -> i64 {
        1_000
    }

    fn stage(command: &str) -> ProcessDescriptor {
        ProcessDescriptor::new(command, Vec::<String>::new())
    }

    fn pipeline(commands: &[&str], background: bool) -> JobDescriptor {
        let line = commands.join(" | ");
        JobDescriptor::new(commands.iter().map(|c| stage(c)).collect(), line)
            .unwrap()
            .in_background(background)
    }

    fn run(host: &mut MockHost, registry: &mut BackgroundRegistry, job: JobDescriptor) -> CoreResult<DispatchResult> {
        Executor::new(host, registry, fixed_clock).run(job)
    }

    #[test]
    fn foreground_single_waits_and_reports_status() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();
        host.set_status("false", ExitStatus::with_code(1));

        let job = JobDescriptor::single(stage("false"), "false").unwrap();
        let result = run(&mut host, &mut registry, job).unwrap();

        assert_eq!(
            result,
            DispatchResult::Completed {
                status: ExitStatus::with_code(1)
            }
        );
        assert!(registry.is_empty());
        assert_eq!(host.mask_depth(), 0);
        assert_eq!(host.pipes_opened(), 0);
    }

    #[test]
    fn single_stage_carries_redirections() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();

        let job = JobDescriptor::single(stage("sort"), "sort < in > out")
            .unwrap()
            .with_input("in")
            .with_output("out");
        run(&mut host, &mut registry, job).unwrap();

        let spawns = host.spawns();
        assert_eq!(spawns.len(), 1);
        assert!(spawns[0].redirected);
        assert_eq!(spawns[0].stdin, None);
        assert_eq!(spawns[0].stdout, None);
    }

    #[test]
    fn background_single_registers_under_full_mask() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();

        let job = JobDescriptor::single(stage("sleep"), "sleep 5 &")
            .unwrap()
            .in_background(true);
        let result = run(&mut host, &mut registry, job).unwrap();

        let pid = host.spawns()[0].pid;
        assert_eq!(result, DispatchResult::Registered { pid });
        assert!(host.waits().is_empty());
        assert_eq!(registry.list()[0].pid, pid);
        assert_eq!(registry.list()[0].started_at, 1_000);

        let calls = host.calls();
        assert_eq!(calls[0], HostCall::Mask(MaskKind::ChildExit));
        assert!(matches!(calls[1], HostCall::Spawn(_)));
        assert_eq!(
            calls[2..],
            [
                HostCall::Mask(MaskKind::All),
                HostCall::Unmask(MaskKind::All),
                HostCall::Unmask(MaskKind::ChildExit),
            ]
        );
    }

    #[test]
    fn pipeline_opens_n_minus_one_pipes_and_closes_everything() {
        for stages in 2..=5 {
            let mut host = MockHost::new();
            let mut registry = BackgroundRegistry::new();
            let commands: Vec<&str> = ["cat", "sort", "uniq", "wc", "tee"][..stages].to_vec();

            run(&mut host, &mut registry, pipeline(&commands, false)).unwrap();

            assert_eq!(host.pipes_opened(), stages - 1);
            assert!(host.open_fds().is_empty(), "leaked {:?}", host.open_fds());
            assert_eq!(host.waits().len(), stages);
            assert_eq!(host.mask_depth(), 0);
        }
    }

    #[test]
    fn pipeline_wires_stages_in_order() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();

        run(&mut host, &mut registry, pipeline(&["printf", "wc", "tee"], false)).unwrap();

        let spawns = host.spawns();
        // Pipes are (100, 101) and (102, 103)
        assert_eq!((spawns[0].stdin, spawns[0].stdout), (None, Some(101)));
        assert_eq!(spawns[0].close_in_child, vec![100]);
        assert_eq!((spawns[1].stdin, spawns[1].stdout), (Some(100), Some(103)));
        assert_eq!(spawns[1].close_in_child, vec![102]);
        assert_eq!((spawns[2].stdin, spawns[2].stdout), (Some(102), None));
        assert!(spawns[2].close_in_child.is_empty());
        assert!(spawns.iter().all(|s| !s.redirected));
    }

    #[test]
    fn pipeline_status_is_last_stage() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();
        host.set_status("grep", ExitStatus::with_code(1));

        let result = run(&mut host, &mut registry, pipeline(&["cat", "grep"], false)).unwrap();
        assert_eq!(
            result,
            DispatchResult::Completed {
                status: ExitStatus::with_code(1)
            }
        );
    }

    #[test]
    fn pipeline_ignores_job_redirection() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();
        let job = pipeline(&["cat", "wc"], false).with_input("in").with_output("out");

        run(&mut host, &mut registry, job).unwrap();
        assert!(host.spawns().iter().all(|s| !s.redirected));
    }

    #[test]
    fn background_pipeline_registers_head_and_waits_the_rest() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();

        let result = run(&mut host, &mut registry, pipeline(&["yes", "head", "wc"], true)).unwrap();

        let spawned: Vec<u32> = host.spawns().iter().map(|s| s.pid).collect();
        assert_eq!(result, DispatchResult::Registered { pid: spawned[0] });
        assert_eq!(host.waits(), spawned[1..].to_vec());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].line, "yes | head | wc");
        assert!(host.open_fds().is_empty());
    }

    #[test]
    fn fork_failure_is_fatal() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();
        host.set_fail_fork(true);

        let job = JobDescriptor::single(stage("true"), "true").unwrap();
        let err = run(&mut host, &mut registry, job).unwrap_err();

        assert!(matches!(err, CoreError::Host(HostError::ForkFailed(_))));
        // Mask released on the error path
        assert_eq!(host.mask_depth(), 0);
    }

    #[test]
    fn pipe_failure_is_fatal() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();
        host.set_fail_pipe(true);

        let err = run(&mut host, &mut registry, pipeline(&["cat", "wc"], false)).unwrap_err();
        assert!(matches!(err, CoreError::Host(HostError::PipeFailed(_))));
        assert!(host.spawns().is_empty());
    }

    #[test]
    fn wait_failure_is_fatal() {
        let mut host = MockHost::new();
        let mut registry = BackgroundRegistry::new();
        host.set_fail_wait(true);

        let job = JobDescriptor::single(stage("true"), "true").unwrap();
        assert!(matches!(
            run(&mut host, &mut registry, job),
            Err(CoreError::Host(HostError::WaitFailed { .. }))
        ));
    }
}
