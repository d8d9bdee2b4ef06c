use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{Job, JobId, JobStatus};

/// How long a finished job stays pollable before it is evicted.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Entry {
    job: Job,
    finished_at: Option<Instant>,
}

/// In-memory job registry.
///
/// The store never reads a clock itself; callers pass `now` so that expiry
/// is deterministic under test. A job is mutable only while it is
/// `IN_PROGRESS`; the first terminal transition wins and every later write
/// is ignored.
#[derive(Debug, Clone)]
pub struct JobStore {
    jobs: HashMap<JobId, Entry>,
    grace_period: Duration,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl JobStore {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            jobs: HashMap::new(),
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn start_job(&mut self, label: impl Into<String>) -> Job {
        let job = Job::new(label);
        self.jobs.insert(
            job.id.clone(),
            Entry {
                job: job.clone(),
                finished_at: None,
            },
        );
        job
    }

    /// Replaces the progress text of a running job.
    pub fn set_message(&mut self, id: &JobId, message: impl Into<String>) -> bool {
        self.with_running(id, |job| job.message = message.into())
    }

    pub fn log(&mut self, id: &JobId, lines: Vec<String>) -> bool {
        self.with_running(id, |job| job.logs.push(lines))
    }

    pub fn log_error(&mut self, id: &JobId, lines: Vec<String>) -> bool {
        self.with_running(id, |job| job.errors.push(lines))
    }

    pub fn set_url(&mut self, id: &JobId, url: impl Into<String>) -> bool {
        self.with_running(id, |job| job.url = Some(url.into()))
    }

    pub fn job_success(&mut self, id: &JobId, message: impl Into<String>, now: Instant) -> bool {
        self.finish(id, JobStatus::Success, message.into(), now)
    }

    pub fn job_error(&mut self, id: &JobId, message: impl Into<String>, now: Instant) -> bool {
        self.finish(id, JobStatus::Error, message.into(), now)
    }

    /// Snapshot of a job, or `None` if unknown or past its grace period.
    pub fn get(&self, id: &JobId, now: Instant) -> Option<Job> {
        let entry = self.jobs.get(id)?;
        if self.is_expired(entry, now) {
            return None;
        }
        Some(entry.job.clone())
    }

    /// Drops every job that has been terminal for longer than the grace
    /// period. Returns the number of evicted jobs.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.jobs.len();
        let grace_period = self.grace_period;
        self.jobs.retain(|_, entry| match entry.finished_at {
            Some(finished_at) => now.saturating_duration_since(finished_at) <= grace_period,
            None => true,
        });
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        entry
            .finished_at
            .is_some_and(|at| now.saturating_duration_since(at) > self.grace_period)
    }

    fn with_running(&mut self, id: &JobId, apply: impl FnOnce(&mut Job)) -> bool {
        match self.jobs.get_mut(id) {
            Some(entry) if !entry.job.is_terminal() => {
                apply(&mut entry.job);
                true
            }
            _ => false,
        }
    }

    fn finish(&mut self, id: &JobId, status: JobStatus, message: String, now: Instant) -> bool {
        match self.jobs.get_mut(id) {
            Some(entry) if !entry.job.is_terminal() => {
                if status == JobStatus::Error {
                    entry.job.errors.push(vec![message.clone()]);
                }
                entry.job.status = status;
                entry.job.message = message;
                entry.finished_at = Some(now);
                true
            }
            _ => false,
        }
    }
}
