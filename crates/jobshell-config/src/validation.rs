//! Configuration validation

use crate::schema::RawConfig;
use jobshell_util::is_valid_time_format;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("shell.prompt cannot be empty")]
    EmptyPrompt,

    #[error("shell.child_failure_status must be in 1..=255, got {0}")]
    FailureStatusOutOfRange(i32),

    #[error("jobs.list_time_format cannot be empty")]
    EmptyTimeFormat,

    #[error("jobs.list_time_format is not a valid strftime pattern: {0:?}")]
    InvalidTimeFormat(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.shell.prompt.as_deref() == Some("") {
        errors.push(ValidationError::EmptyPrompt);
    }

    if let Some(status) = config.shell.child_failure_status
        && !(1..=255).contains(&status)
    {
        errors.push(ValidationError::FailureStatusOutOfRange(status));
    }

    match config.jobs.list_time_format.as_deref() {
        Some("") => errors.push(ValidationError::EmptyTimeFormat),
        Some(format) if !is_valid_time_format(format) => {
            errors.push(ValidationError::InvalidTimeFormat(format.to_string()));
        }
        _ => {}
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawJobsSection, RawShellSection};

    fn raw(shell: RawShellSection, jobs: RawJobsSection) -> RawConfig {
        RawConfig {
            config_version: 1,
            shell,
            jobs,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&raw(Default::default(), Default::default())).is_empty());
    }

    #[test]
    fn failure_status_bounds() {
        for (status, ok) in [(0, false), (1, true), (127, true), (255, true), (256, false), (-1, false)] {
            let config = raw(
                RawShellSection {
                    prompt: None,
                    child_failure_status: Some(status),
                },
                Default::default(),
            );
            assert_eq!(validate_config(&config).is_empty(), ok, "status {}", status);
        }
    }

    #[test]
    fn bad_strftime_is_rejected() {
        let config = raw(
            Default::default(),
            RawJobsSection {
                list_time_format: Some("%Q".into()),
            },
        );
        assert_eq!(
            validate_config(&config),
            vec![ValidationError::InvalidTimeFormat("%Q".into())]
        );
    }

    #[test]
    fn all_errors_are_reported() {
        let config = raw(
            RawShellSection {
                prompt: Some(String::new()),
                child_failure_status: Some(300),
            },
            RawJobsSection {
                list_time_format: Some(String::new()),
            },
        );

        let errors = validate_config(&config);
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyPrompt,
                ValidationError::FailureStatusOutOfRange(300),
                ValidationError::EmptyTimeFormat,
            ]
        );
    }
}
