//! Job-control core for jobshell
//!
//! This crate is the heart of jobshell, containing:
//! - The pipeline/process executor (fork, pipe chaining, wait or register)
//! - The background job registry, ordered by start time
//! - The `JobControl` engine the control loop drives: dispatch, poll, list, shutdown
//!
//! All OS access goes through [`jobshell_host_api::ProcessHost`], so the
//! whole state machine runs against `MockHost` in tests.

mod engine;
mod error;
mod executor;
mod registry;

pub use engine::*;
pub use error::*;
pub use executor::*;
pub use registry::*;
