//! Shared utilities for jobshell
//!
//! This crate provides:
//! - Wall-clock timestamps with seconds resolution (with a mock override in debug builds)
//! - Default paths for the configuration file

mod paths;
mod time;

pub use paths::*;
pub use time::*;
