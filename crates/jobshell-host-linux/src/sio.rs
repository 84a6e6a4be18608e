//! Async-signal-safe output
//!
//! Everything here is callable from a signal handler: no allocation, no
//! locks, no buffered streams. Output goes straight to `write(2)`.

use nix::errno::Errno;
use nix::unistd::write;
use std::os::fd::{BorrowedFd, RawFd};

/// Enough room for `-9223372036854775808`
pub const DECIMAL_BUF_LEN: usize = 20;

/// Write all of `bytes` to `fd`, retrying on partial writes and EINTR.
///
/// Errors are swallowed; a handler has nowhere to report them.
pub fn write_all(fd: RawFd, mut bytes: &[u8]) {
    // SAFETY: the standard descriptors stay open for the life of the process
    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
    while !bytes.is_empty() {
        match write(fd, bytes) {
            Ok(0) => return,
            Ok(n) => bytes = &bytes[n..],
            Err(Errno::EINTR) => continue,
            Err(_) => return,
        }
    }
}

/// Render `value` in base 10 into the tail of `buf`, returning the digits.
pub fn format_decimal(value: i64, buf: &mut [u8; DECIMAL_BUF_LEN]) -> &[u8] {
    let mut magnitude = value.unsigned_abs();
    let mut start = buf.len();
    loop {
        start -= 1;
        buf[start] = b'0' + (magnitude % 10) as u8;
        magnitude /= 10;
        if magnitude == 0 {
            break;
        }
    }
    if value < 0 {
        start -= 1;
        buf[start] = b'-';
    }
    &buf[start..]
}

/// Write `value` in base 10 to `fd`.
pub fn write_decimal(fd: RawFd, value: i64) {
    let mut buf = [0u8; DECIMAL_BUF_LEN];
    write_all(fd, format_decimal(value, &mut buf));
}
