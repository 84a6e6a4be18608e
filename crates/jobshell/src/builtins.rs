//! Built-in commands handled by the shell itself

use jobshell_api::{JobDescriptor, JobListing};
use jobshell_host_api::ExitStatus;
use jobshell_util::format_timestamp;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    Exit,
    Cd(Option<String>),
    Estatus,
    Bglist,
}

impl Builtin {
    /// Match a parsed job against the built-in names.
    ///
    /// Only the first stage's command is considered; the rest of the job
    /// is ignored.
    pub fn recognize(job: &JobDescriptor) -> Option<Self> {
        let stage = job.first_stage();
        match stage.command() {
            "exit" => Some(Self::Exit),
            "cd" => Some(Self::Cd(stage.argv().get(1).cloned())),
            "estatus" => Some(Self::Estatus),
            "bglist" => Some(Self::Bglist),
            _ => None,
        }
    }
}

/// Change directory to `target`, or `$HOME` without one, and print the new cwd.
pub fn change_dir(target: Option<&str>, out: &mut impl Write, err: &mut impl Write) -> io::Result<()> {
    let destination = match target {
        Some(dir) => Some(PathBuf::from(dir)),
        None => env::var_os("HOME").map(PathBuf::from),
    };

    let result = match destination {
        Some(dir) => env::set_current_dir(&dir).and_then(|_| env::current_dir()),
        None => Err(io::Error::new(io::ErrorKind::NotFound, "HOME not set")),
    };

    match result {
        Ok(cwd) => writeln!(out, "{}", cwd.display()),
        Err(e) => writeln!(err, "cd: {}: {}", target.unwrap_or("~"), e),
    }
}

/// Print the exit code of the last foreground job, `0` if none has run.
pub fn print_status(last: Option<ExitStatus>, out: &mut impl Write) -> io::Result<()> {
    let code = last.map(|s| s.shell_code()).unwrap_or(0);
    writeln!(out, "{}", code)
}

/// Print one `<time>\t<pid>\t<line>` row per background job.
pub fn print_listing(listings: &[JobListing], time_format: &str, out: &mut impl Write) -> io::Result<()> {
    for listing in listings {
        writeln!(
            out,
            "{}\t{}\t{}",
            format_timestamp(listing.started_at, time_format),
            listing.pid,
            listing.line
        )?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use serial_test::serial;

    fn builtin(line: &str) -> Option<Builtin> {
        Builtin::recognize(&parse_line(line).unwrap().unwrap())
    }

    #[test]
    fn recognizes_builtins() {
        assert_eq!(builtin("exit"), Some(Builtin::Exit));
        assert_eq!(builtin("cd"), Some(Builtin::Cd(None)));
        assert_eq!(builtin("cd /tmp"), Some(Builtin::Cd(Some("/tmp".into()))));
        assert_eq!(builtin("estatus"), Some(Builtin::Estatus));
        assert_eq!(builtin("bglist"), Some(Builtin::Bglist));
        assert_eq!(builtin("ls"), None);
        assert_eq!(builtin("echo exit"), None);
    }

    #[test]
    fn status_defaults_to_zero() {
        let mut out = Vec::new();
        print_status(None, &mut out).unwrap();
        print_status(Some(ExitStatus::with_code(127)), &mut out).unwrap();
        print_status(Some(ExitStatus::signaled(9)), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0\n127\n137\n");
    }

    #[test]
    fn listing_rows() {
        let listings = vec![
            JobListing {
                pid: 11,
                started_at: 0,
                line: "sleep 5 &".into(),
            },
            JobListing {
                pid: 12,
                started_at: 60,
                line: "yes | head &".into(),
            },
        ];
        let mut out = Vec::new();
        print_listing(&listings, "%s", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0\t11\tsleep 5 &\n60\t12\tyes | head &\n"
        );
    }

    #[test]
    #[serial]
    fn cd_prints_new_directory() {
        let original = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().canonicalize().unwrap();

        let (mut out, mut err) = (Vec::new(), Vec::new());
        change_dir(target.to_str(), &mut out, &mut err).unwrap();
        let printed = String::from_utf8(out).unwrap();

        env::set_current_dir(&original).unwrap();
        assert_eq!(printed, format!("{}\n", target.display()));
        assert!(err.is_empty());
    }

    #[test]
    #[serial]
    fn cd_failure_reports_on_stderr() {
        let original = env::current_dir().unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());

        change_dir(Some("/definitely/not/here"), &mut out, &mut err).unwrap();

        assert!(out.is_empty());
        assert!(String::from_utf8(err).unwrap().starts_with("cd: /definitely/not/here: "));
        assert_eq!(env::current_dir().unwrap(), original);
    }
}
