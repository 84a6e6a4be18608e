//! Validated settings

use crate::schema::{RawConfig, RawJobsSection, RawShellSection};
use jobshell_util::DEFAULT_LIST_TIME_FORMAT;

/// Prompt used when the config does not set one
pub const DEFAULT_PROMPT: &str = "<53shell>$ ";

/// Reserved exit status for children that fail before running the command
pub const DEFAULT_CHILD_FAILURE_STATUS: i32 = 127;

/// Validated configuration ready for use by the shell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellConfig {
    pub shell: ShellSettings,
    pub jobs: JobSettings,
}

impl ShellConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            shell: ShellSettings::from_raw(raw.shell),
            jobs: JobSettings::from_raw(raw.jobs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub prompt: String,
    pub child_failure_status: i32,
}

impl ShellSettings {
    fn from_raw(raw: RawShellSection) -> Self {
        Self {
            prompt: raw.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            child_failure_status: raw
                .child_failure_status
                .unwrap_or(DEFAULT_CHILD_FAILURE_STATUS),
        }
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self::from_raw(RawShellSection::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    pub list_time_format: String,
}

impl JobSettings {
    fn from_raw(raw: RawJobsSection) -> Self {
        Self {
            list_time_format: raw
                .list_time_format
                .unwrap_or_else(|| DEFAULT_LIST_TIME_FORMAT.to_string()),
        }
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self::from_raw(RawJobsSection::default())
    }
}
