//! Job table.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use reelgen_models::{Job, JobId, JobStatus};

/// Storage for job records.
///
/// Mutations go through the lifecycle methods so progress stays monotonic
/// and each job reaches exactly one terminal state.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job);

    async fn get(&self, id: &JobId) -> Option<Job>;

    /// Jobs sorted by start time, optionally filtered by status.
    async fn list(&self, status: Option<JobStatus>) -> Vec<Job>;

    async fn advance(&self, id: &JobId, progress: u8);

    /// Returns false if the job is unknown or already terminal.
    async fn complete(&self, id: &JobId, output_path: &str) -> bool;

    /// Returns false if the job is unknown or already terminal.
    async fn fail(&self, id: &JobId, error: &str) -> bool;
}

/// Process-local job table.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    async fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.0.cmp(&b.id.0)));
        jobs
    }

    async fn advance(&self, id: &JobId, progress: u8) {
        if let Some(job) = self.jobs.write().await.get_mut(id) {
            job.advance(progress);
        }
    }

    async fn complete(&self, id: &JobId, output_path: &str) -> bool {
        match self.jobs.write().await.get_mut(id) {
            Some(job) => job.complete(output_path),
            None => false,
        }
    }

    async fn fail(&self, id: &JobId, error: &str) -> bool {
        match self.jobs.write().await.get_mut(id) {
            Some(job) => job.fail(error),
            None => false,
        }
    }
}
