//! File redirection for single-stage jobs
//!
//! Both operations run inside the forked child. Rebinding uses `dup2` onto
//! the fixed standard slot and then closes the opened descriptor. Nothing
//! is restored afterwards: the child's descriptor table is discarded on
//! exec or exit and is never shared back with the shell.

use jobshell_api::Redirections;
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::libc;
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2};
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Permissions for files created by `>` and `2>`
const CREATE_MODE: u32 = 0o644;

/// Redirection failures. Each one aborts only the child that hit it.
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("redirection error: input, output and error targets must be distinct")]
    ConflictingTargets,

    #[error("redirection error: cannot open input {path}: {source}")]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("redirection error: cannot open output {path}: {source}")]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("redirection error: cannot open error output {path}: {source}")]
    ErrorOpen {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("redirection error: cannot rebind descriptor {target}: {source}")]
    Rebind {
        target: RawFd,
        #[source]
        source: Errno,
    },
}

/// Fail when any two declared targets are the same path.
///
/// Pure check on the path text: it opens nothing, so a rejected job never
/// creates or truncates a file.
pub fn validate_distinct_targets(redirections: &Redirections) -> Result<(), RedirectError> {
    if redirections.has_conflict() {
        return Err(RedirectError::ConflictingTargets);
    }
    Ok(())
}

/// Open each declared target and bind it onto its standard stream.
///
/// Input is opened read-only. Output and error are created if absent and
/// truncated if present.
pub fn apply_redirections(redirections: &Redirections) -> Result<(), RedirectError> {
    if let Some(path) = &redirections.input {
        let fd = open(path.as_path(), OFlag::O_RDONLY, Mode::empty()).map_err(|source| {
            RedirectError::InputNotFound {
                path: path.clone(),
                source,
            }
        })?;
        rebind(fd, libc::STDIN_FILENO)?;
    }

    if let Some(path) = &redirections.output {
        let fd = open_for_write(path).map_err(|source| RedirectError::OutputOpen {
            path: path.clone(),
            source,
        })?;
        rebind(fd, libc::STDOUT_FILENO)?;
    }

    if let Some(path) = &redirections.error {
        let fd = open_for_write(path).map_err(|source| RedirectError::ErrorOpen {
            path: path.clone(),
            source,
        })?;
        rebind(fd, libc::STDERR_FILENO)?;
    }

    Ok(())
}

fn open_for_write(path: &Path) -> nix::Result<RawFd> {
    open(
        path,
        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
        Mode::from_bits_truncate(CREATE_MODE),
    )
}

/// Duplicate `fd` onto `target` and close the original.
pub(crate) fn rebind(fd: RawFd, target: RawFd) -> Result<(), RedirectError> {
    if fd == target {
        return Ok(());
    }
    dup2(fd, target).map_err(|source| RedirectError::Rebind { target, source })?;
    close(fd).map_err(|source| RedirectError::Rebind { target, source })?;
    Ok(())
}
