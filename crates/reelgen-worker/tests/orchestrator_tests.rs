//! Orchestrator behavior with in-process fakes for the encoder and speech.

use async_trait::async_trait;
use reelgen_media::{Compositor, MediaError, MediaMetadata, MediaResult, SlideshowRequest};
use reelgen_models::{JobOptions, JobStatus, SpeechProviderKind};
use reelgen_providers::{ImageChain, ProviderResult, SpeechChain, SpeechProvider};
use reelgen_worker::{Orchestrator, WorkerConfig, WorkerError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct FakeCompositor {
    fail_compose: bool,
    narration_secs: f64,
    requests: Mutex<Vec<SlideshowRequest>>,
}

#[async_trait]
impl Compositor for FakeCompositor {
    async fn compose_slideshow(&self, request: &SlideshowRequest) -> MediaResult<PathBuf> {
        if self.fail_compose {
            return Err(MediaError::encoding_failed("fallback encode failed", None, Some(1)));
        }
        self.requests.lock().unwrap().push(request.clone());
        tokio::fs::write(&request.output, b"video").await?;
        Ok(request.output.clone())
    }

    async fn mux_narration(&self, video: &Path, audio: &Path, output: &Path, _loop_audio: bool) -> MediaResult<()> {
        if audio.file_name().is_some_and(|n| n.to_string_lossy().contains("boom")) {
            panic!("mux exploded");
        }
        let mut bytes = tokio::fs::read(video).await?;
        bytes.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, bytes).await?;
        Ok(())
    }

    async fn probe_metadata(&self, _path: &Path) -> MediaMetadata {
        MediaMetadata {
            duration: self.narration_secs,
            ..MediaMetadata::default()
        }
    }
}

struct FakeSpeech;

#[async_trait]
impl SpeechProvider for FakeSpeech {
    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::GoogleTts
    }

    fn max_request_len(&self) -> usize {
        10_000
    }

    async fn synthesize(&self, _text: &str, _voice: &str) -> ProviderResult<Vec<u8>> {
        Ok(b"mp3".to_vec())
    }
}

struct Harness {
    work: TempDir,
    out: TempDir,
    assets: TempDir,
    compositor: Arc<FakeCompositor>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new(compositor: FakeCompositor) -> Self {
        Self::build(compositor, vec![Arc::new(FakeSpeech)], true)
    }

    fn build(compositor: FakeCompositor, speakers: Vec<Arc<dyn SpeechProvider>>, retain_failed: bool) -> Self {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let assets = TempDir::new().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            std::fs::write(assets.path().join(name), name.as_bytes()).unwrap();
        }

        let config = WorkerConfig::default()
            .with_work_dir(work.path())
            .with_output_dir(out.path())
            .with_retain_failed_workspaces(retain_failed);
        let compositor = Arc::new(compositor);
        let orchestrator = Orchestrator::new(
            config,
            Arc::new(SpeechChain::new(speakers)),
            Arc::new(ImageChain::new().with_local_dir(assets.path())),
            compositor.clone(),
        );

        Self {
            work,
            out,
            assets,
            compositor,
            orchestrator,
        }
    }

    fn asset(&self, name: &str) -> PathBuf {
        self.assets.path().join(name)
    }
}

fn healthy() -> FakeCompositor {
    FakeCompositor {
        narration_secs: 6.0,
        ..FakeCompositor::default()
    }
}

#[tokio::test]
async fn paragraphs_become_text_slides() {
    let h = Harness::new(healthy());
    let job = tokio_test::assert_ok!(
        h.orchestrator
            .submit(JobOptions::new("Ocean facts", "Whales sing.\n\nOctopuses have three hearts."))
            .await
    );
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.progress, 0);

    let job = h.orchestrator.wait(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.end_time.is_some());
    let output = PathBuf::from(job.output_path.unwrap());
    assert_eq!(output, h.out.path().join(format!("{}.mp4", job.id)));
    assert_eq!(std::fs::read(&output).unwrap(), b"videomp3");

    let requests = h.compositor.requests.lock().unwrap();
    let slides = &requests[0].slides;
    assert_eq!(slides.len(), 2);
    assert_eq!(slides[0].text.as_deref(), Some("Whales sing."));
    assert_eq!(slides[1].text.as_deref(), Some("Octopuses have three hearts."));
    assert!(slides.iter().all(|s| s.duration == 3.0));

    // Backgrounds are generated in the workspace, not taken from image assets
    let workspace = h.work.path().join(job.id.as_str());
    assert_eq!(slides[0].image, workspace.join("text_00.png"));
    assert_eq!(slides[1].image, workspace.join("text_01.png"));

    // Workspace removed on success
    assert!(!h.work.path().join(job.id.as_str()).exists());
}

#[tokio::test]
async fn stock_query_uses_the_image_chain() {
    let h = Harness::new(healthy());
    let job = h
        .orchestrator
        .submit(JobOptions::new("Forest", "Tall trees.\n\nDeep moss.").with_stock_query("forest"))
        .await
        .unwrap();
    let job = h.orchestrator.wait(&job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let requests = h.compositor.requests.lock().unwrap();
    let slides = &requests[0].slides;
    let workspace = h.work.path().join(job.id.as_str());
    assert_eq!(slides.len(), 2);
    // No remote providers in the harness, so the local assets fill in
    assert_eq!(slides[0].image, workspace.join("image_00.png"));
    assert_eq!(slides[1].image, workspace.join("image_01.png"));
    assert_eq!(slides[1].text.as_deref(), Some("Deep moss."));
}

#[tokio::test]
async fn caller_images_and_duration_override() {
    let h = Harness::new(healthy());
    let mut options = JobOptions::new("Mine", "One paragraph only.")
        .with_images(vec![h.asset("c.png"), h.asset("a.png"), h.asset("b.png")]);
    options.image_duration = Some(2.5);

    let job = h.orchestrator.submit(options).await.unwrap();
    let job = h.orchestrator.wait(&job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let requests = h.compositor.requests.lock().unwrap();
    let slides = &requests[0].slides;
    assert_eq!(slides.len(), 3);
    assert_eq!(slides[0].image, h.asset("c.png"));
    assert!(slides.iter().all(|s| s.text.is_none() && s.duration == 2.5));
}

#[tokio::test]
async fn short_narration_keeps_one_second_slides() {
    let h = Harness::new(FakeCompositor {
        narration_secs: 1.5,
        ..FakeCompositor::default()
    });
    let job = h
        .orchestrator
        .submit(JobOptions::new("Quick", "A.\n\nB.\n\nC."))
        .await
        .unwrap();
    h.orchestrator.wait(&job.id).await.unwrap();

    let requests = h.compositor.requests.lock().unwrap();
    assert!(requests[0].slides.iter().all(|s| s.duration == 1.0));
}

#[tokio::test]
async fn invalid_input_is_rejected_synchronously() {
    let h = Harness::new(healthy());

    let err = h
        .orchestrator
        .submit(JobOptions::new("   ", "Script."))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Validation(_)));

    let err = h
        .orchestrator
        .submit(JobOptions::new("Title", "\n\n"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Validation(_)));

    let missing = h.asset("missing.mp3");
    let err = h
        .orchestrator
        .submit(JobOptions::new("Title", "Script.").with_audio(&missing))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::ResourceMissing(path) if path == missing));

    assert!(h.orchestrator.list(None).await.is_empty());
}

#[tokio::test]
async fn stage_failure_is_recorded_on_the_job() {
    let h = Harness::new(FakeCompositor {
        fail_compose: true,
        narration_secs: 4.0,
        ..FakeCompositor::default()
    });
    let job = h
        .orchestrator
        .submit(JobOptions::new("Broken", "Text."))
        .await
        .unwrap();
    let job = h.orchestrator.wait(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 50);
    assert!(job.end_time.is_some());
    assert!(job.output_path.is_none());
    let message = job.error_message.unwrap();
    assert!(message.starts_with("compose: "), "{message}");

    // Retained for inspection by default
    assert!(h.work.path().join(job.id.as_str()).is_dir());
}

#[tokio::test]
async fn failed_workspace_removed_when_not_retained() {
    let failing = FakeCompositor {
        fail_compose: true,
        ..FakeCompositor::default()
    };
    let h = Harness::build(failing, vec![Arc::new(FakeSpeech)], false);
    let job = h
        .orchestrator
        .submit(JobOptions::new("Broken", "Text."))
        .await
        .unwrap();
    let job = h.orchestrator.wait(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(!h.work.path().join(job.id.as_str()).exists());
}

#[tokio::test]
async fn exhausted_speech_fails_narration_stage() {
    let h = Harness::build(healthy(), Vec::new(), true);
    let job = h
        .orchestrator
        .submit(JobOptions::new("Silent", "Nobody can say this."))
        .await
        .unwrap();
    let job = h.orchestrator.wait(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 0);
    let message = job.error_message.unwrap();
    assert!(message.starts_with("narration: All providers exhausted"), "{message}");
}

#[tokio::test]
async fn panicking_job_does_not_affect_others() {
    let h = Harness::new(healthy());
    let boom = h.assets.path().join("boom.mp3");
    std::fs::write(&boom, b"x").unwrap();

    let bad = h
        .orchestrator
        .submit(JobOptions::new("Bad", "Text.").with_audio(&boom))
        .await
        .unwrap();
    let good = h
        .orchestrator
        .submit(JobOptions::new("Good", "Text."))
        .await
        .unwrap();

    let bad = h.orchestrator.wait(&bad.id).await.unwrap();
    let good = h.orchestrator.wait(&good.id).await.unwrap();

    assert_eq!(bad.status, JobStatus::Failed);
    assert!(bad.error_message.unwrap().contains("mux exploded"));
    assert_eq!(good.status, JobStatus::Completed);
}

#[tokio::test]
async fn list_orders_by_start_time_and_filters() {
    let h = Harness::new(healthy());
    let mut ids = Vec::new();
    for title in ["first", "second", "third"] {
        let job = h
            .orchestrator
            .submit(JobOptions::new(title, "Text."))
            .await
            .unwrap();
        ids.push(job.id);
    }
    for id in &ids {
        h.orchestrator.wait(id).await.unwrap();
    }

    let titles: Vec<_> = h
        .orchestrator
        .list(None)
        .await
        .into_iter()
        .map(|j| j.title)
        .collect();
    assert_eq!(titles, vec!["first", "second", "third"]);
    assert_eq!(h.orchestrator.list(Some(JobStatus::Completed)).await.len(), 3);
    assert!(h.orchestrator.list(Some(JobStatus::Failed)).await.is_empty());

    // Waiting again returns the stored record
    let again = h.orchestrator.wait(&ids[0]).await.unwrap();
    assert_eq!(again.status, JobStatus::Completed);
}

#[tokio::test]
async fn unknown_job() {
    let h = Harness::new(healthy());
    let id = reelgen_models::JobId::new();
    assert!(h.orchestrator.get(&id).await.is_none());
    assert!(matches!(
        h.orchestrator.wait(&id).await,
        Err(WorkerError::JobNotFound(_))
    ));
}
