//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

use reelgen_models::{JobId, ValidationError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Resource not found: {0}")]
    ResourceMissing(PathBuf),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("{stage}: {message}")]
    Stage { stage: &'static str, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn stage(stage: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Stage {
            stage,
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_message_is_prefixed() {
        let err = WorkerError::stage("compose", "Encoding failed: exit 1");
        assert_eq!(err.to_string(), "compose: Encoding failed: exit 1");
    }
}
