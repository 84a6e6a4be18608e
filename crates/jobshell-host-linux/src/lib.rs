//! POSIX host for jobshell
//!
//! Provides:
//! - Stage spawning via fork/exec with descriptor rebinding
//! - File redirection applied inside the child before exec
//! - Blocking waits, non-blocking reap sweeps and forced kills
//! - Async-signal-safe handlers for child exit, identification and faults
//! - Signal-mask guards used as the critical section around fork/record

mod process;
mod redirect;
mod signals;
pub mod sio;

pub use process::*;
pub use redirect::*;
pub use signals::*;
