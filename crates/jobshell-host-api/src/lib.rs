//! Process host interface for jobshell
//!
//! This crate defines the narrow interface between the job-control core and
//! the operating system's process model. It contains no platform code
//! itself; the POSIX implementation lives in `jobshell-host-linux`.

mod mock;
mod status;
mod traits;

pub use mock::*;
pub use status::*;
pub use traits::*;
