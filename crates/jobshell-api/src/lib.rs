//! Data model for jobshell
//!
//! The parser produces a [`JobDescriptor`] per input line. The core takes
//! ownership of it on dispatch and either drops it once a foreground job
//! finishes or moves it into the background registry.

mod job;
mod notice;

pub use job::*;
pub use notice::*;
