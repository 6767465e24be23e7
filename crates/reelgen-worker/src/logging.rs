//! Structured job logging utilities.
//!
//! Every event emitted through [`JobLogger`] carries the job ID and the
//! operation, so a job's history can be filtered out of interleaved logs.

use tracing::{error, info, warn, Span};
use reelgen_models::JobId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    /// Create a logger for `job_id`.
    ///
    /// # Arguments
    /// * `job_id` - The unique identifier for the job
    /// * `operation` - The type of operation (e.g., "video_generation")
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, title: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            title,
            "Job started"
        );
    }

    /// A stage finished and the job reached its checkpoint.
    pub fn log_progress(&self, stage: &str, progress: u8) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            stage,
            progress,
            "Job progress: {} done", stage
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, output: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            output,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// Span for the job's background task; provider and encoder events
    /// emitted inside it inherit the job ID.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = self.operation
        )
    }
}
