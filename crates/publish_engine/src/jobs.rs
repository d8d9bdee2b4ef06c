use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use pipeline_logging::{pipeline_debug, pipeline_info};
use publish_core::{Job, JobId, JobStore};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Shared handle over the process-wide [`JobStore`], driven by the tokio
/// clock so paused-time tests control expiry.
#[derive(Debug, Clone)]
pub struct JobManager {
    store: Arc<Mutex<JobStore>>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::with_store(JobStore::default())
    }
}

impl JobManager {
    pub fn new(grace_period: Duration) -> Self {
        Self::with_store(JobStore::new(grace_period))
    }

    fn with_store(store: JobStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn start_job(&self, label: impl Into<String>) -> Job {
        let job = self.lock().start_job(label);
        pipeline_debug!(job = job.id; "Started: {}", job.label);
        job
    }

    pub fn set_message(&self, id: &JobId, message: impl Into<String>) -> bool {
        self.lock().set_message(id, message)
    }

    pub fn log(&self, id: &JobId, lines: Vec<String>) -> bool {
        self.lock().log(id, lines)
    }

    pub fn log_error(&self, id: &JobId, lines: Vec<String>) -> bool {
        self.lock().log_error(id, lines)
    }

    pub fn set_url(&self, id: &JobId, url: impl Into<String>) -> bool {
        self.lock().set_url(id, url)
    }

    /// Returns `false` when the job was already terminal or is unknown.
    pub fn job_success(&self, id: &JobId, message: impl Into<String>) -> bool {
        self.lock().job_success(id, message, now())
    }

    /// Returns `false` when the job was already terminal or is unknown.
    pub fn job_error(&self, id: &JobId, message: impl Into<String>) -> bool {
        self.lock().job_error(id, message, now())
    }

    /// Snapshot of the job, or `None` once it has expired.
    pub fn get_job(&self, id: &JobId) -> Option<Job> {
        self.lock().get(id, now())
    }

    pub fn is_terminal(&self, id: &JobId) -> bool {
        self.get_job(id).is_none_or(|job| job.is_terminal())
    }

    pub fn sweep(&self) -> usize {
        self.lock().sweep(now())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs [`JobManager::sweep`] every `interval` until every handle to the
    /// store is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store: Weak<Mutex<JobStore>> = Arc::downgrade(&self.store);
        pipeline_info!("Job sweeper running every {:?}", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .sweep(now());
                if removed > 0 {
                    pipeline_debug!("Swept {} expired jobs", removed);
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, JobStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}
