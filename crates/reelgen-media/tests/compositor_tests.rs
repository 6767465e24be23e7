//! End-to-end encoder tests. Skipped when ffmpeg/ffprobe are not installed.

use reelgen_media::{
    check_ffmpeg, check_ffprobe, render_placeholder, try_probe, AudioFit, Compositor,
    FfmpegCommand, FfmpegCompositor, FfmpegInput, FfmpegRunner, MediaError, Slide,
    SlideshowRequest,
};
use reelgen_models::{EncodingConfig, Resolution, SlideStyle, TextPosition, Transition};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SMALL: Resolution = Resolution::new(160, 288);

fn encoder_available() -> bool {
    let ok = check_ffmpeg().is_ok() && check_ffprobe().is_ok();
    if !ok {
        eprintln!("ffmpeg/ffprobe not found, skipping");
    }
    ok
}

fn fast_encoding() -> EncodingConfig {
    let mut encoding = EncodingConfig::default();
    encoding.preset = "ultrafast".to_string();
    encoding.video_bitrate = "300k".to_string();
    encoding
}

async fn slides(dir: &Path, durations: &[f64]) -> Vec<Slide> {
    let mut out = Vec::new();
    for (i, duration) in durations.iter().enumerate() {
        let path = render_placeholder(dir.join(format!("slide_{i}.png")), i, SMALL)
            .await
            .unwrap();
        out.push(Slide::new(path, *duration));
    }
    out
}

async fn tone(path: PathBuf, seconds: f64) -> PathBuf {
    let cmd = FfmpegCommand::new(&path)
        .input(
            FfmpegInput::file(format!("sine=frequency=440:duration={seconds}"))
                .arg("-f")
                .arg("lavfi"),
        )
        .audio_codec("aac");
    FfmpegRunner::new().run(&cmd).await.unwrap();
    path
}

#[tokio::test]
async fn slideshow_duration_matches_slides() {
    if !encoder_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let slides = slides(dir.path(), &[1.5, 1.5]).await;
    let request = SlideshowRequest::new(
        vec![slides[0].clone().with_text("First slide"), slides[1].clone()],
        dir.path().join("out").join("slideshow.mp4"),
        SMALL,
    )
    .with_style(SlideStyle {
        text_position: TextPosition::Bottom,
        transition: Transition::Fade,
        ..SlideStyle::default()
    })
    .with_encoding(fast_encoding())
    .with_work_dir(dir.path());

    let path = FfmpegCompositor::new().compose_slideshow(&request).await.unwrap();

    let meta = try_probe(&path).await.unwrap();
    assert!((meta.duration - 3.0).abs() < 0.3, "duration {}", meta.duration);
    assert_eq!((meta.width, meta.height), (160, 288));
}

#[tokio::test]
async fn missing_slide_fails_before_encoding() {
    let dir = TempDir::new().unwrap();
    let request = SlideshowRequest::new(
        vec![Slide::new(dir.path().join("gone.png"), 1.0)],
        dir.path().join("out.mp4"),
        SMALL,
    );

    let err = FfmpegCompositor::new().compose_slideshow(&request).await.unwrap_err();

    assert!(matches!(err, MediaError::FileNotFound(_)));
    assert!(!dir.path().join("out.mp4").exists());
}

#[tokio::test]
async fn loop_flag_truncates_to_shorter_audio() {
    if !encoder_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let compositor = FfmpegCompositor::new();
    let request = SlideshowRequest::new(slides(dir.path(), &[3.0]).await, dir.path().join("v.mp4"), SMALL)
        .with_style(SlideStyle::plain())
        .with_encoding(fast_encoding());
    let video = compositor.compose_slideshow(&request).await.unwrap();
    let audio = tone(dir.path().join("short.m4a"), 1.0).await;
    let output = dir.path().join("muxed.mp4");

    compositor.mux_narration(&video, &audio, &output, true).await.unwrap();

    let meta = compositor.probe_metadata(&output).await;
    assert!(meta.duration < 1.6, "duration {}", meta.duration);
}

#[tokio::test]
async fn loop_fit_covers_whole_video() {
    if !encoder_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let compositor = FfmpegCompositor::new();
    let request = SlideshowRequest::new(slides(dir.path(), &[3.0]).await, dir.path().join("v.mp4"), SMALL)
        .with_style(SlideStyle::plain())
        .with_encoding(fast_encoding());
    let video = compositor.compose_slideshow(&request).await.unwrap();
    let audio = tone(dir.path().join("short.m4a"), 1.0).await;
    let output = dir.path().join("looped.mp4");

    compositor
        .mux_with_fit(&video, &audio, &output, AudioFit::Loop)
        .await
        .unwrap();

    let meta = compositor.probe_metadata(&output).await;
    assert!(meta.duration > 2.5, "duration {}", meta.duration);
}
