//! User-visible background job notices

use std::fmt;
use std::io::{self, Write};

/// A `[pid] <raw command line>` line, printed when a background job is
/// reaped, removed, or killed at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice<'a> {
    pub pid: u32,
    pub line: &'a str,
}

impl<'a> Notice<'a> {
    pub fn new(pid: u32, line: &'a str) -> Self {
        Self { pid, line }
    }

    /// Write the notice followed by a newline and flush.
    pub fn emit(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "{}", self)?;
        out.flush()
    }
}

impl fmt::Display for Notice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.pid, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_template() {
        assert_eq!(Notice::new(4242, "sleep 5 &").to_string(), "[4242] sleep 5 &");
    }

    #[test]
    fn emit_appends_newline() {
        let mut out = Vec::new();
        Notice::new(7, "yes | head").emit(&mut out).unwrap();
        assert_eq!(out, b"[7] yes | head\n");
    }
}
