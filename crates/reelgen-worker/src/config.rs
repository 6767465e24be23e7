//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent of the per-job workspaces
    pub work_dir: PathBuf,
    /// Where finished videos are copied
    pub output_dir: PathBuf,
    /// Local images used when stock search comes up short
    pub examples_dir: Option<PathBuf>,
    /// Keep the workspace of a failed job for inspection
    pub retain_failed_workspaces: bool,
    /// Kill a single encoder run after this long
    pub encoder_timeout: Duration,
    /// How long shutdown waits for running jobs
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("reelgen"),
            output_dir: PathBuf::from("output"),
            examples_dir: None,
            retain_failed_workspaces: true,
            encoder_timeout: Duration::from_secs(1800), // 30 minutes
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("WORKER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            examples_dir: std::env::var("WORKER_EXAMPLES_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            retain_failed_workspaces: std::env::var("WORKER_RETAIN_FAILED_WORKSPACES")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.retain_failed_workspaces),
            encoder_timeout: Duration::from_secs(
                std::env::var("WORKER_ENCODER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_retain_failed_workspaces(mut self, retain: bool) -> Self {
        self.retain_failed_workspaces = retain;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_retain_failed() {
        let config = WorkerConfig::default();
        assert!(config.retain_failed_workspaces);
        assert!(config.examples_dir.is_none());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
