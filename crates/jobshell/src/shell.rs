//! The interactive control loop

use anyhow::{Context, Result};
use jobshell_config::ShellConfig;
use jobshell_core::JobControl;
use jobshell_host_api::ProcessHost;
use std::io::{self, BufRead, Write};
use tracing::{debug, info};

use crate::builtins::{self, Builtin};
use crate::parser::parse_line;

/// What the loop does after a line has been handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell<H: ProcessHost, W: Write> {
    control: JobControl<H, W>,
    config: ShellConfig,
}

impl<H: ProcessHost, W: Write> Shell<H, W> {
    pub fn new(control: JobControl<H, W>, config: ShellConfig) -> Self {
        Self { control, config }
    }

    /// Prompt, read and handle lines until `exit` or end of input.
    ///
    /// End of input behaves like `exit`. Every background job is killed
    /// before this returns, on error paths too.
    pub fn run(&mut self, input: impl BufRead, out: &mut impl Write, err: &mut impl Write) -> Result<()> {
        let result = self.read_loop(input, out, err);
        if result.is_err() {
            self.exit();
        }
        result
    }

    fn read_loop(&mut self, mut input: impl BufRead, out: &mut impl Write, err: &mut impl Write) -> Result<()> {
        let mut raw = Vec::new();
        loop {
            write!(out, "{}", self.config.shell.prompt)?;
            out.flush()?;

            raw.clear();
            match input.read_until(b'\n', &mut raw) {
                Ok(0) => {
                    writeln!(out)?;
                    debug!("End of input");
                    self.exit();
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("Failed to read command line"),
            }

            // Arguments are passed on as text; invalid bytes become U+FFFD
            let line = String::from_utf8_lossy(&raw);
            if self.handle_line(&line, out, err)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Handle one command line: reap finished jobs, then parse and run it.
    pub fn handle_line(&mut self, line: &str, out: &mut impl Write, err: &mut impl Write) -> Result<Flow> {
        self.control
            .poll_and_reap()
            .context("Failed to reap background jobs")?;

        let job = match parse_line(line) {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                writeln!(err, "{}", e)?;
                return Ok(Flow::Continue);
            }
        };

        match Builtin::recognize(&job) {
            Some(Builtin::Exit) => {
                self.exit();
                return Ok(Flow::Exit);
            }
            Some(Builtin::Cd(target)) => builtins::change_dir(target.as_deref(), out, err)?,
            Some(Builtin::Estatus) => builtins::print_status(self.control.last_status(), out)?,
            Some(Builtin::Bglist) => builtins::print_listing(
                &self.control.list(),
                &self.config.jobs.list_time_format,
                out,
            )?,
            None => {
                let result = self.control.dispatch(job).context("Failed to run job")?;
                debug!(?result, "Job dispatched");
            }
        }
        Ok(Flow::Continue)
    }

    pub fn control(&self) -> &JobControl<H, W> {
        &self.control
    }

    fn exit(&mut self) {
        let killed = self.control.shutdown();
        info!(killed, "Shell exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobshell_host_api::{ExitStatus, MockHost};

    fn shell(host: &MockHost) -> Shell<MockHost, Vec<u8>> {
        let control = JobControl::with_clock(host.clone(), Vec::new(), || 0);
        Shell::new(control, ShellConfig::default())
    }

    fn run_lines(shell: &mut Shell<MockHost, Vec<u8>>, lines: &[&str]) -> (String, String, Flow) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let mut flow = Flow::Continue;
        for line in lines {
            flow = shell.handle_line(line, &mut out, &mut err).unwrap();
        }
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
            flow,
        )
    }

    #[test]
    fn background_jobs_listed_and_killed_on_exit() {
        let host = MockHost::new();
        let mut shell = shell(&host);

        let (out, _, flow) = run_lines(&mut shell, &["sleep 5 &", "bglist"]);
        assert_eq!(flow, Flow::Continue);
        let pid = shell.control().list()[0].pid;
        assert!(out.ends_with(&format!("\t{}\tsleep 5 &\n", pid)));

        let (_, _, flow) = run_lines(&mut shell, &["exit"]);
        assert_eq!(flow, Flow::Exit);
        assert_eq!(host.kills(), vec![pid]);
        assert_eq!(
            String::from_utf8(shell.control().notices().clone()).unwrap(),
            format!("[{}] sleep 5 &\n", pid)
        );
    }

    #[test]
    fn estatus_reports_last_foreground_job() {
        let host = MockHost::new();
        host.set_status("false", ExitStatus::with_code(1));
        let mut shell = shell(&host);

        let (out, _, _) = run_lines(&mut shell, &["estatus", "false", "estatus", "true", "estatus"]);
        assert_eq!(out, "0\n1\n0\n");
    }

    #[test]
    fn finished_jobs_reaped_before_next_line() {
        let host = MockHost::new();
        let mut shell = shell(&host);

        run_lines(&mut shell, &["sleep 1 &"]);
        let pid = shell.control().list()[0].pid;
        host.finish(pid, ExitStatus::success());

        run_lines(&mut shell, &[""]);
        assert!(shell.control().list().is_empty());
    }

    #[test]
    fn syntax_errors_do_not_reach_the_core() {
        let host = MockHost::new();
        let mut shell = shell(&host);

        let (_, err, flow) = run_lines(&mut shell, &["ls | | wc", "cat <"]);
        assert_eq!(flow, Flow::Continue);
        assert_eq!(err.lines().count(), 2);
        assert!(host.spawns().is_empty());
    }

    #[test]
    fn end_of_input_drains_jobs() {
        let host = MockHost::new();
        let mut shell = shell(&host);
        let input = io::Cursor::new("sleep 30 &\nsleep 40 &\n");
        let (mut out, mut err) = (Vec::new(), Vec::new());

        shell.run(input, &mut out, &mut err).unwrap();

        assert_eq!(host.kills().len(), 2);
        assert!(shell.control().list().is_empty());
        let prompt = ShellConfig::default().shell.prompt;
        assert_eq!(String::from_utf8(out).unwrap(), format!("{p}{p}{p}\n", p = prompt));
    }

    #[test]
    fn invalid_utf8_input_keeps_the_shell_running() {
        let host = MockHost::new();
        let mut shell = shell(&host);
        let input = io::Cursor::new(b"sleep 30 &\n\xff\nestatus\n".to_vec());
        let (mut out, mut err) = (Vec::new(), Vec::new());

        shell.run(input, &mut out, &mut err).unwrap();

        let spawned: Vec<String> = host.spawns().into_iter().map(|s| s.command).collect();
        assert_eq!(spawned, vec!["sleep".to_string(), "\u{FFFD}".to_string()]);
        assert_eq!(host.kills(), vec![host.spawns()[0].pid]);
        assert!(shell.control().list().is_empty());
    }

    /// Serves `data` once, then fails every read.
    struct BrokenInput {
        data: Option<Vec<u8>>,
    }

    impl io::Read for BrokenInput {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.take() {
                Some(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                None => Err(io::Error::other("terminal went away")),
            }
        }
    }

    #[test]
    fn read_failure_still_drains_jobs() {
        let host = MockHost::new();
        let mut shell = shell(&host);
        let input = io::BufReader::new(BrokenInput {
            data: Some(b"sleep 30 &\n".to_vec()),
        });
        let (mut out, mut err) = (Vec::new(), Vec::new());

        assert!(shell.run(input, &mut out, &mut err).is_err());

        let pid = host.spawns()[0].pid;
        assert_eq!(host.kills(), vec![pid]);
        assert!(!host.is_running(pid));
        assert!(shell.control().list().is_empty());
    }
}
