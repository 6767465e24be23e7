//! Video generation job record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::options::JobOptions;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Stages are running
    #[default]
    Processing,
    /// Output is available
    Completed,
    /// A stage failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One video generation request and its tracked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Video title
    pub title: String,

    /// Current status
    pub status: JobStatus,

    /// Progress (0-100), never decreases
    #[serde(default)]
    pub progress: u8,

    /// Submission timestamp
    pub start_time: DateTime<Utc>,

    /// Set when the job reaches a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Final artifact (completed jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    /// Failure reason (failed jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Submitted options
    pub options: JobOptions,
}

impl Job {
    /// Create a new job in the processing state.
    pub fn new(options: JobOptions) -> Self {
        Self {
            id: JobId::new(),
            title: options.title.clone(),
            status: JobStatus::Processing,
            progress: 0,
            start_time: Utc::now(),
            end_time: None,
            output_path: None,
            error_message: None,
            options,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Raise progress to `progress`. Lower values and updates on terminal
    /// jobs are ignored.
    pub fn advance(&mut self, progress: u8) {
        if self.is_terminal() {
            return;
        }
        self.progress = self.progress.max(progress.min(100));
    }

    /// Mark job as completed. Returns false if the job was already terminal.
    pub fn complete(&mut self, output_path: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.output_path = Some(output_path.into());
        self.end_time = Some(Utc::now());
        true
    }

    /// Mark job as failed. Returns false if the job was already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.end_time = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> JobOptions {
        JobOptions::new("Title", "Line one.\n\nLine two.")
    }

    #[test]
    fn test_job_creation() {
        let job = Job::new(options());

        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 0);
        assert_eq!(job.title, "Title");
        assert!(job.end_time.is_none());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = Job::new(options());

        job.advance(30);
        job.advance(10);
        assert_eq!(job.progress, 30);

        job.advance(250);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_single_terminal_transition() {
        let mut job = Job::new(options());

        assert!(job.complete("/out/video.mp4"));
        assert!(!job.fail("late failure"));

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_none());
        assert_eq!(job.output_path.as_deref(), Some("/out/video.mp4"));
        assert!(job.end_time.is_some());
    }

    #[test]
    fn test_failed_job_keeps_progress() {
        let mut job = Job::new(options());
        job.advance(50);

        assert!(job.fail("compose: encoder crashed"));
        job.advance(85);

        assert_eq!(job.progress, 50);
        assert!(job.output_path.is_none());
    }
}
