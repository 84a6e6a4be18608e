//! Time utilities for jobshell
//!
//! Background jobs are stamped with wall-clock seconds when they are
//! registered. The registry orders entries by that stamp at seconds
//! resolution.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `JOBSHELL_MOCK_TIME` environment variable can be set
//! to shift the clock. The mocked clock keeps advancing at the real rate.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Write;
use std::sync::OnceLock;

#[cfg(debug_assertions)]
use chrono::NaiveDateTime;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "JOBSHELL_MOCK_TIME";

/// Format accepted by [`MOCK_TIME_ENV_VAR`]
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default format used when listing background jobs (ctime style)
pub const DEFAULT_LIST_TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Offset between mock time and real time, computed once per process.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            match parse_mock_time(&raw) {
                Some(mock) => {
                    let offset = mock.signed_duration_since(Local::now());
                    tracing::info!(
                        mock_time = %raw,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                None => {
                    tracing::warn!(
                        mock_time = %raw,
                        expected_format = MOCK_TIME_FORMAT,
                        "Invalid mock time"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

#[cfg(debug_assertions)]
fn parse_mock_time(raw: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(raw, MOCK_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).single()
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    mock_time_offset().is_some()
}

/// Current local time, respecting mock time in debug builds.
pub fn now() -> DateTime<Local> {
    let real_now = Local::now();
    match mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Current time as whole seconds since the Unix epoch.
pub fn now_seconds() -> i64 {
    now().timestamp()
}

/// Render a seconds timestamp in local time.
///
/// Falls back to the raw number when the timestamp is out of chrono's range
/// or the format string is not valid strftime.
pub fn format_timestamp(seconds: i64, format: &str) -> String {
    let Some(dt) = Local.timestamp_opt(seconds, 0).single() else {
        return seconds.to_string();
    };
    let mut rendered = String::new();
    match write!(rendered, "{}", dt.format(format)) {
        Ok(()) => rendered,
        Err(_) => seconds.to_string(),
    }
}

/// Returns true when `format` contains only valid strftime items.
pub fn is_valid_time_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}
