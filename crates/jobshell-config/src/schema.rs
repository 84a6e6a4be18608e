//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Interactive shell settings
    #[serde(default)]
    pub shell: RawShellSection,

    /// Background job settings
    #[serde(default)]
    pub jobs: RawJobsSection,
}

/// `[shell]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawShellSection {
    /// Prompt printed before each line
    pub prompt: Option<String>,

    /// Exit status used by children that fail redirection or exec
    pub child_failure_status: Option<i32>,
}

/// `[jobs]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawJobsSection {
    /// chrono format string for registration times in `bglist`
    pub list_time_format: Option<String>,
}
