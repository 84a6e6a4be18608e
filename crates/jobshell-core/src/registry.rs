//! Background job registry

use jobshell_api::{JobDescriptor, JobListing};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("pid {0} is already tracked as a background job")]
    DuplicatePid(u32),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// A live background job.
///
/// `pid` is the first stage's pid and stands for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJob {
    pid: u32,
    started_at: i64,
    job: JobDescriptor,
}

impl BackgroundJob {
    pub fn new(pid: u32, started_at: i64, job: JobDescriptor) -> Self {
        Self {
            pid,
            started_at,
            job,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Registration time, seconds since the Unix epoch
    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn job(&self) -> &JobDescriptor {
        &self.job
    }

    pub fn line(&self) -> &str {
        self.job.line()
    }

    pub fn listing(&self) -> JobListing {
        JobListing {
            pid: self.pid,
            started_at: self.started_at,
            line: self.job.line().to_string(),
        }
    }
}

/// Live background jobs, ascending by start time.
///
/// A new job is placed before the first entry whose start time is greater
/// than or equal to its own, so among equal timestamps the most recently
/// inserted job comes first.
///
/// The registry itself knows nothing about signals. Callers mutate it
/// only while every signal is blocked.
#[derive(Debug, Default)]
pub struct BackgroundRegistry {
    entries: Vec<BackgroundJob>,
}

impl BackgroundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `entry` and place it in start-time order.
    pub fn insert_in_order(&mut self, entry: BackgroundJob) -> RegistryResult<()> {
        if self.contains(entry.pid) {
            return Err(RegistryError::DuplicatePid(entry.pid));
        }
        let index = self
            .entries
            .iter()
            .position(|e| e.started_at >= entry.started_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, entry);
        Ok(())
    }

    /// Unlink the entry for `pid`. An unknown pid leaves the registry untouched.
    pub fn remove_by_pid(&mut self, pid: u32) -> Option<BackgroundJob> {
        let index = self.entries.iter().position(|e| e.pid == pid)?;
        Some(self.entries.remove(index))
    }

    /// Remove every entry, returned in registry order.
    pub fn drain_all(&mut self) -> Vec<BackgroundJob> {
        std::mem::take(&mut self.entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackgroundJob> {
        self.entries.iter()
    }

    pub fn list(&self) -> Vec<JobListing> {
        self.entries.iter().map(BackgroundJob::listing).collect()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.entries.iter().any(|e| e.pid == pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
