//! Command-line parsing
//!
//! Whitespace-separated words only; there is no quoting. Recognized
//! operators must stand alone as words:
//! - `|` separates pipeline stages
//! - `< path` on the first stage, `> path` on the last stage
//! - `2> path` on the first stage
//! - a trailing `&` runs the job in the background

use jobshell_api::{DescriptorError, JobDescriptor, ProcessDescriptor};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid syntax: missing command")]
    MissingCommand,

    #[error("invalid syntax: expected a file name after '{0}'")]
    MissingTarget(&'static str),

    #[error("invalid syntax: '{0}' given more than once")]
    DuplicateRedirection(&'static str),

    #[error("invalid syntax: '{0}' is not allowed on this stage")]
    MisplacedRedirection(&'static str),

    #[error("invalid syntax: '&' must end the line")]
    MisplacedBackground,

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

#[derive(Debug, Default)]
struct StageWords {
    words: Vec<String>,
    error_path: Option<PathBuf>,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<JobDescriptor>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let mut stages = vec![StageWords::default()];
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut background = false;

    while let Some(token) = tokens.next() {
        if background {
            return Err(ParseError::MisplacedBackground);
        }
        let first = stages.len() == 1;
        let current = stages.len() - 1;
        match token {
            "|" => {
                if stages[current].words.is_empty() || output.is_some() {
                    return Err(if output.is_some() {
                        ParseError::MisplacedRedirection(">")
                    } else {
                        ParseError::MissingCommand
                    });
                }
                stages.push(StageWords::default());
            }
            "&" => background = true,
            "<" => {
                let path = target(&mut tokens, "<")?;
                if !first {
                    return Err(ParseError::MisplacedRedirection("<"));
                }
                set_once(&mut input, path, "<")?;
            }
            ">" => {
                let path = target(&mut tokens, ">")?;
                set_once(&mut output, path, ">")?;
            }
            "2>" => {
                let path = target(&mut tokens, "2>")?;
                if !first {
                    return Err(ParseError::MisplacedRedirection("2>"));
                }
                set_once(&mut stages[current].error_path, path, "2>")?;
            }
            word => stages[current].words.push(word.to_string()),
        }
    }

    let mut pipeline = Vec::with_capacity(stages.len());
    for stage in stages {
        let mut words = stage.words.into_iter();
        let Some(command) = words.next() else {
            return Err(ParseError::MissingCommand);
        };
        let mut process = ProcessDescriptor::new(command, words);
        if let Some(path) = stage.error_path {
            process = process.with_error_path(path);
        }
        pipeline.push(process);
    }

    let mut job = JobDescriptor::new(pipeline, line)?.in_background(background);
    if let Some(path) = input {
        job = job.with_input(path);
    }
    if let Some(path) = output {
        job = job.with_output(path);
    }
    Ok(Some(job))
}

fn target<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    operator: &'static str,
) -> Result<PathBuf, ParseError> {
    match tokens.next() {
        Some(word) if !matches!(word, "|" | "&" | "<" | ">" | "2>") => Ok(PathBuf::from(word)),
        _ => Err(ParseError::MissingTarget(operator)),
    }
}

fn set_once(
    slot: &mut Option<PathBuf>,
    path: PathBuf,
    operator: &'static str,
) -> Result<(), ParseError> {
    if slot.is_some() {
        return Err(ParseError::DuplicateRedirection(operator));
    }
    *slot = Some(path);
    Ok(())
}
