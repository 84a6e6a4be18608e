//! Core error types

use jobshell_host_api::HostError;
use thiserror::Error;

use crate::RegistryError;

/// Errors surfaced to the control loop.
///
/// Every variant is fatal to the shell: a failed fork, pipe or wait leaves
/// pipeline bookkeeping half-built, and a registry error means the pid
/// uniqueness invariant no longer holds.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type CoreResult<T> = Result<T, CoreError>;
