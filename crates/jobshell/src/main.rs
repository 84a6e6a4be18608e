//! jobshell - a small POSIX shell
//!
//! This is the main entry point. It wires together:
//! - Configuration loading
//! - The Linux process host and its signal handlers
//! - The job-control core
//! - The interactive control loop

mod builtins;
mod parser;
mod shell;

use anyhow::{Context, Result};
use clap::Parser;
use jobshell_config::{load_config, load_config_or_default, ShellConfig};
use jobshell_core::JobControl;
use jobshell_host_linux::LinuxHost;
use jobshell_util::{default_config_path, JOBSHELL_CONFIG_ENV};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::shell::Shell;

/// jobshell - pipelines, redirection and background jobs
#[derive(Parser, Debug)]
#[command(name = "jobshell")]
#[command(about = "A small POSIX shell with background job control", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/jobshell/config.toml)
    #[arg(short, long, env = JOBSHELL_CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn load(args: &Args) -> Result<ShellConfig> {
    // An explicitly named file must exist; the default one is optional
    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let path = default_config_path();
            load_config_or_default(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))?
        }
    };
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never mix with job notices
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "jobshell starting");

    let config = load(&args)?;
    info!(
        failure_status = config.shell.child_failure_status,
        "Configuration loaded"
    );

    let host = LinuxHost::new(config.shell.child_failure_status)
        .context("Failed to set up process host")?;
    let control = JobControl::new(host, io::stdout());
    let mut shell = Shell::new(control, config);

    shell.run(io::stdin().lock(), &mut io::stdout(), &mut io::stderr())
}
