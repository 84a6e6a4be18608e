//! Job and process descriptors

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from building a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("Pipeline must contain at least one stage")]
    EmptyPipeline,

    #[error("Stage {0} has an empty command")]
    EmptyCommand(usize),
}

/// One stage of a pipeline.
///
/// `argv[0]` is conventionally the command name; the executor passes `argv`
/// to the new image unchanged and resolves `command` through `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    command: String,
    argv: Vec<String>,
    /// Stderr redirection. Only honored on the first stage of a job.
    error_path: Option<PathBuf>,
}

impl ProcessDescriptor {
    /// Build a stage whose argv is `[command, args...]`.
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = command.into();
        let mut argv = vec![command.clone()];
        argv.extend(args.into_iter().map(Into::into));
        Self {
            command,
            argv,
            error_path: None,
        }
    }

    pub fn with_error_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_path = Some(path.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn error_path(&self) -> Option<&Path> {
        self.error_path.as_deref()
    }
}

/// A parsed command line: one or more stages plus job-level redirection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pipeline: Vec<ProcessDescriptor>,
    input_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    background: bool,
    /// Raw command-line text, kept for listings and notices
    line: String,
}

impl JobDescriptor {
    pub fn new(pipeline: Vec<ProcessDescriptor>, line: impl Into<String>) -> Result<Self, DescriptorError> {
        if pipeline.is_empty() {
            return Err(DescriptorError::EmptyPipeline);
        }
        if let Some(index) = pipeline.iter().position(|p| p.command.is_empty()) {
            return Err(DescriptorError::EmptyCommand(index));
        }
        Ok(Self {
            pipeline,
            input_path: None,
            output_path: None,
            background: false,
            line: line.into(),
        })
    }

    /// Single-stage job convenience constructor.
    pub fn single(process: ProcessDescriptor, line: impl Into<String>) -> Result<Self, DescriptorError> {
        Self::new(vec![process], line)
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn in_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn pipeline(&self) -> &[ProcessDescriptor] {
        &self.pipeline
    }

    pub fn first_stage(&self) -> &ProcessDescriptor {
        // Non-empty by construction
        &self.pipeline[0]
    }

    pub fn stage_count(&self) -> usize {
        self.pipeline.len()
    }

    pub fn is_pipeline(&self) -> bool {
        self.pipeline.len() > 1
    }

    pub fn input_path(&self) -> Option<&Path> {
        self.input_path.as_deref()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Redirection targets that apply when this job runs as a single stage.
    pub fn redirections(&self) -> Redirections {
        Redirections {
            input: self.input_path.clone(),
            output: self.output_path.clone(),
            error: self.first_stage().error_path.clone(),
        }
    }
}

/// File targets bound to the standard streams of a single-stage job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirections {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub error: Option<PathBuf>,
}

impl Redirections {
    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none() && self.error.is_none()
    }

    /// Returns true when any two declared targets name the same path.
    ///
    /// Comparison is on the literal path text; no filesystem lookups happen.
    pub fn has_conflict(&self) -> bool {
        let targets = [&self.input, &self.output, &self.error];
        for (i, a) in targets.iter().enumerate() {
            let Some(a) = a else { continue };
            for b in targets[i + 1..].iter().copied().flatten() {
                if a.as_os_str() == b.as_os_str() {
                    return true;
                }
            }
        }
        false
    }
}

/// Read-only view of a background registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub pid: u32,
    /// Registration time, seconds since the Unix epoch
    pub started_at: i64,
    pub line: String,
}
