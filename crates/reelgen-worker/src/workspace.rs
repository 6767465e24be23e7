//! Per-job scratch directory.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use reelgen_models::JobId;

/// `<work_dir>/<job_id>/`, owned by one job.
#[derive(Debug)]
pub struct TempWorkspace {
    path: PathBuf,
}

impl TempWorkspace {
    /// Create the workspace directory for `job_id`.
    ///
    /// The path is made absolute so list files written inside it stay valid
    /// whatever directory ffmpeg resolves them from.
    pub async fn create(work_dir: &Path, job_id: &JobId) -> std::io::Result<Self> {
        let path = std::path::absolute(work_dir.join(job_id.as_str()))?;
        fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Workspace created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Apply the retention policy: successful workspaces are removed,
    /// failed ones only when `retain_failed` is off.
    ///
    /// Returns true if the directory was kept.
    pub async fn finish(self, succeeded: bool, retain_failed: bool) -> bool {
        if !succeeded && retain_failed {
            debug!(path = %self.path.display(), "Workspace retained");
            return true;
        }
        if let Err(e) = fs::remove_dir_all(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "Failed to remove workspace");
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_under_work_dir() {
        let root = TempDir::new().unwrap();
        let id = JobId::from_string("job-1");
        let ws = TempWorkspace::create(root.path(), &id).await.unwrap();

        assert_eq!(ws.path(), root.path().join("job-1"));
        assert!(ws.path().is_dir());
        assert_eq!(ws.join("a.mp4"), root.path().join("job-1").join("a.mp4"));
    }

    #[tokio::test]
    async fn test_relative_work_dir_becomes_absolute() {
        let root = TempDir::new_in(".").unwrap();
        let relative = Path::new(root.path().file_name().unwrap());

        let ws = TempWorkspace::create(relative, &JobId::from_string("rel")).await.unwrap();

        assert!(ws.path().is_absolute());
        assert!(ws.path().is_dir());
        assert_eq!(ws.path(), std::env::current_dir().unwrap().join(relative).join("rel"));
    }

    #[tokio::test]
    async fn test_retention_policy() {
        let root = TempDir::new().unwrap();

        let ok = TempWorkspace::create(root.path(), &JobId::from_string("ok")).await.unwrap();
        assert!(!ok.finish(true, true).await);
        assert!(!root.path().join("ok").exists());

        let kept = TempWorkspace::create(root.path(), &JobId::from_string("kept")).await.unwrap();
        assert!(kept.finish(false, true).await);
        assert!(root.path().join("kept").is_dir());

        let dropped = TempWorkspace::create(root.path(), &JobId::from_string("dropped")).await.unwrap();
        assert!(!dropped.finish(false, false).await);
        assert!(!root.path().join("dropped").exists());
    }
}
