//! Default paths for jobshell
//!
//! - Config: `$XDG_CONFIG_HOME/jobshell/config.toml` or `~/.config/jobshell/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the config path
pub const JOBSHELL_CONFIG_ENV: &str = "JOBSHELL_CONFIG";

/// Application subdirectory name
const APP_DIR: &str = "jobshell";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Get the default config path.
///
/// Order of precedence:
/// 1. `$XDG_CONFIG_HOME/jobshell/config.toml` (if XDG_CONFIG_HOME is set)
/// 2. `~/.config/jobshell/config.toml` (fallback)
///
/// `JOBSHELL_CONFIG` is handled by the CLI layer.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join(CONFIG_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_names_the_app() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("jobshell"));
        assert_eq!(path.file_name().unwrap(), "config.toml");
    }
}
