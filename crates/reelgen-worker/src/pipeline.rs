//! Stage sequence for one job.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use reelgen_media::{copy_file, render_text_background, Compositor, Slide, SlideshowRequest};
use reelgen_models::{EncodingConfig, JobId, JobOptions};
use reelgen_providers::{ChainResult, ImageChain, ImageRequest, SpeechChain};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::script::{narration_text, paragraphs};
use crate::store::JobStore;
use crate::workspace::TempWorkspace;

/// Shortest time a computed slide stays on screen.
pub const MIN_IMAGE_DURATION: f64 = 1.0;

/// Collaborators shared by every job.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub speech: Arc<SpeechChain>,
    pub images: Arc<ImageChain>,
    pub compositor: Arc<dyn Compositor>,
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Narration,
    Slides,
    Probe,
    Compose,
    Mux,
    Finalize,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Narration => "narration",
            Stage::Slides => "slides",
            Stage::Probe => "probe",
            Stage::Compose => "compose",
            Stage::Mux => "mux",
            Stage::Finalize => "finalize",
        }
    }

    /// Job progress once the stage has finished.
    pub fn checkpoint(&self) -> u8 {
        match self {
            Stage::Narration => 10,
            Stage::Slides => 30,
            Stage::Probe => 50,
            Stage::Compose => 70,
            Stage::Mux => 85,
            Stage::Finalize => 100,
        }
    }
}

/// Seconds per slide: the override when given, otherwise the narration
/// spread evenly over the slides.
pub fn image_duration(narration_secs: f64, slide_count: usize, override_secs: Option<f64>) -> f64 {
    if let Some(secs) = override_secs {
        return secs;
    }
    if slide_count == 0 || !narration_secs.is_finite() {
        return MIN_IMAGE_DURATION;
    }
    (narration_secs / slide_count as f64).max(MIN_IMAGE_DURATION)
}

/// Background image and optional overlay text for one slide.
type SlideSource = (PathBuf, Option<String>);

pub(crate) struct JobRun<'a> {
    pub ctx: &'a PipelineContext,
    pub store: &'a dyn JobStore,
    pub job_id: &'a JobId,
    pub options: &'a JobOptions,
    pub workspace: &'a TempWorkspace,
    pub logger: &'a JobLogger,
    pub cancel: &'a watch::Receiver<bool>,
}

impl JobRun<'_> {
    /// Run every stage and return the final artifact in the output directory.
    pub async fn execute(&self) -> WorkerResult<PathBuf> {
        self.enter(Stage::Narration)?;
        let narration = self.narrate().await.map_err(|e| WorkerError::stage(Stage::Narration.name(), e))?;
        self.reached(Stage::Narration).await;

        self.enter(Stage::Slides)?;
        let sources = self.slide_sources().await?;
        self.reached(Stage::Slides).await;

        self.enter(Stage::Probe)?;
        let metadata = self.ctx.compositor.probe_metadata(&narration).await;
        let duration = image_duration(metadata.duration, sources.len(), self.options.image_duration);
        tracing::debug!(
            narration_secs = metadata.duration,
            slides = sources.len(),
            image_duration = duration,
            "Slide timing"
        );
        self.reached(Stage::Probe).await;

        self.enter(Stage::Compose)?;
        let slides = sources
            .into_iter()
            .map(|(image, text)| match text {
                Some(text) => Slide::new(image, duration).with_text(text),
                None => Slide::new(image, duration),
            })
            .collect();
        let request = SlideshowRequest::new(
            slides,
            self.workspace.join("slideshow.mp4"),
            self.options.platform.resolution(),
        )
        .with_style(self.options.style.clone())
        .with_encoding(EncodingConfig::for_quality(self.options.quality, self.options.platform))
        .with_work_dir(self.workspace.path());
        let video = self
            .ctx
            .compositor
            .compose_slideshow(&request)
            .await
            .map_err(|e| WorkerError::stage(Stage::Compose.name(), e))?;
        self.reached(Stage::Compose).await;

        self.enter(Stage::Mux)?;
        let muxed = self.workspace.join("final.mp4");
        self.ctx
            .compositor
            .mux_narration(&video, &narration, &muxed, true)
            .await
            .map_err(|e| WorkerError::stage(Stage::Mux.name(), e))?;
        self.reached(Stage::Mux).await;

        self.enter(Stage::Finalize)?;
        let output = self.ctx.config.output_dir.join(format!("{}.mp4", self.job_id));
        copy_file(&muxed, &output)
            .await
            .map_err(|e| WorkerError::stage(Stage::Finalize.name(), e))?;
        Ok(output)
    }

    fn enter(&self, stage: Stage) -> WorkerResult<()> {
        if *self.cancel.borrow() {
            return Err(WorkerError::stage(stage.name(), "cancelled"));
        }
        Ok(())
    }

    async fn reached(&self, stage: Stage) {
        self.store.advance(self.job_id, stage.checkpoint()).await;
        self.logger.log_progress(stage.name(), stage.checkpoint());
    }

    async fn narrate(&self) -> ChainResult<PathBuf> {
        if let Some(audio) = &self.options.audio {
            return Ok(audio.clone());
        }
        let text = narration_text(&paragraphs(&self.options.script));
        let output = self
            .ctx
            .speech
            .synthesize_to(&text, &self.options.voice, self.workspace.path())
            .await?;
        if output.provider != self.options.voice.provider {
            self.logger.log_warning(&format!(
                "narration served by fallback provider {}",
                output.provider.as_str()
            ));
        }
        Ok(output.path)
    }

    /// Caller images as-is, otherwise one text slide per paragraph. Text
    /// slides get generated backgrounds unless the job asks for stock photos.
    async fn slide_sources(&self) -> WorkerResult<Vec<SlideSource>> {
        if !self.options.images.is_empty() {
            return Ok(self.options.images.iter().map(|p| (p.clone(), None)).collect());
        }

        let texts = paragraphs(&self.options.script);
        let resolution = self.options.platform.resolution();
        let backgrounds: Vec<PathBuf> = match &self.options.stock_query {
            Some(query) => {
                let request = ImageRequest::new(query, texts.len(), resolution).with_cache_key(query);
                self.ctx
                    .images
                    .acquire(&request, self.workspace.path())
                    .await
                    .map_err(|e| WorkerError::stage(Stage::Slides.name(), e))?
                    .into_iter()
                    .map(|image| image.path)
                    .collect()
            }
            None => {
                let mut paths = Vec::with_capacity(texts.len());
                for index in 0..texts.len() {
                    let path = self.workspace.join(format!("text_{index:02}.png"));
                    let path = render_text_background(&path, index, resolution)
                        .await
                        .map_err(|e| WorkerError::stage(Stage::Slides.name(), e))?;
                    paths.push(path);
                }
                paths
            }
        };

        Ok(backgrounds
            .into_iter()
            .zip(texts)
            .map(|(image, text)| (image, Some(text)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_increase() {
        let stages = [
            Stage::Narration,
            Stage::Slides,
            Stage::Probe,
            Stage::Compose,
            Stage::Mux,
            Stage::Finalize,
        ];
        let checkpoints: Vec<u8> = stages.iter().map(Stage::checkpoint).collect();
        assert_eq!(checkpoints, vec![10, 30, 50, 70, 85, 100]);
    }

    #[test]
    fn test_image_duration_spreads_narration() {
        assert_eq!(image_duration(12.0, 4, None), 3.0);
    }

    #[test]
    fn test_image_duration_has_floor() {
        assert_eq!(image_duration(2.0, 5, None), MIN_IMAGE_DURATION);
        assert_eq!(image_duration(f64::NAN, 2, None), MIN_IMAGE_DURATION);
    }

    #[test]
    fn test_image_duration_override_wins() {
        assert_eq!(image_duration(30.0, 2, Some(0.5)), 0.5);
    }
}
