//! Compositor seam used by the job pipeline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use crate::command::FfmpegRunner;
use crate::error::MediaResult;
use crate::mux::{self, AudioFit};
use crate::probe::{self, MediaMetadata};
use crate::slideshow::{self, SlideshowRequest};

/// Video composition operations.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Render the slideshow and return the output path.
    async fn compose_slideshow(&self, request: &SlideshowRequest) -> MediaResult<PathBuf>;

    /// Replace the video's audio track with narration.
    async fn mux_narration(&self, video: &Path, audio: &Path, output: &Path, loop_audio: bool) -> MediaResult<()>;

    /// Media metadata; never fails.
    async fn probe_metadata(&self, path: &Path) -> MediaMetadata;
}

/// FFmpeg-backed compositor.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCompositor {
    runner: FfmpegRunner,
}

impl FfmpegCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill encoder runs that exceed `secs`.
    pub fn with_timeout(secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(secs),
        }
    }

    /// Compose and mux through a preconfigured runner.
    pub fn with_runner(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    /// Kill running encoders once `cancel_rx` turns true.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_cancel(cancel_rx);
        self
    }

    /// Mux with an explicit fit mode.
    pub async fn mux_with_fit(&self, video: &Path, audio: &Path, output: &Path, fit: AudioFit) -> MediaResult<()> {
        mux::mux_with_fit(&self.runner, video, audio, output, fit).await
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn compose_slideshow(&self, request: &SlideshowRequest) -> MediaResult<PathBuf> {
        let outcome = slideshow::compose(&self.runner, request).await?;
        Ok(outcome.path)
    }

    async fn mux_narration(&self, video: &Path, audio: &Path, output: &Path, loop_audio: bool) -> MediaResult<()> {
        mux::mux_narration(&self.runner, video, audio, output, loop_audio).await
    }

    async fn probe_metadata(&self, path: &Path) -> MediaMetadata {
        probe::probe_metadata(path).await
    }
}
