//! Compositor control flow against a scripted stand-in for ffmpeg, so the
//! fallback and mux paths are covered without a real encoder.
#![cfg(unix)]

use reelgen_media::slideshow::compose;
use reelgen_media::{
    render_text_background, Compositor, FfmpegCompositor, FfmpegRunner, Slide, SlideshowRequest,
};
use reelgen_models::Resolution;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

const RES: Resolution = Resolution::new(90, 160);

#[derive(Clone, Copy)]
enum Encoder {
    Healthy = 0,
    RejectsFilterGraph = 1,
    Broken = 2,
}

/// Shell scripts standing in for ffmpeg. Each appends its arguments to
/// `<output>.calls`, then fails or writes the output file (last argument).
///
/// Written once, before any test spawns a process, so no script is still
/// open for writing when another thread forks.
fn fake_ffmpeg(encoder: Encoder) -> &'static Path {
    static SCRIPTS: OnceLock<(TempDir, Vec<PathBuf>)> = OnceLock::new();
    let (_, scripts) = SCRIPTS.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let rules = [
            "",
            r#"case " $* " in *" -filter_complex "*) echo "No such filter" >&2; exit 1;; esac"#,
            r#"echo "encoder broken" >&2; exit 1"#,
        ];
        let scripts = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                let path = dir.path().join(format!("ffmpeg-{i}"));
                let body = format!(
                    "#!/bin/sh\nfor arg in \"$@\"; do out=\"$arg\"; done\necho \"$*\" >> \"$out.calls\"\n{rule}\nprintf rendered > \"$out\"\n"
                );
                std::fs::write(&path, body).unwrap();
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
                path
            })
            .collect();
        (dir, scripts)
    });
    &scripts[encoder as usize]
}

fn runner(encoder: Encoder) -> FfmpegRunner {
    FfmpegRunner::new().with_binary(fake_ffmpeg(encoder))
}

fn calls(output: &Path) -> Vec<String> {
    let mut log = output.as_os_str().to_owned();
    log.push(".calls");
    std::fs::read_to_string(PathBuf::from(log))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

async fn request(dir: &Path) -> (SlideshowRequest, Vec<PathBuf>) {
    let mut images = Vec::new();
    for i in 0..2 {
        images.push(
            render_text_background(dir.join(format!("bg_{i}.png")), i, RES)
                .await
                .unwrap(),
        );
    }
    let request = SlideshowRequest::new(
        vec![
            Slide::new(&images[0], 2.0).with_text("Hello"),
            Slide::new(&images[1], 1.5),
        ],
        dir.join("out").join("slideshow.mp4"),
        RES,
    )
    .with_work_dir(dir.join("scratch"));
    (request, images)
}

#[tokio::test]
async fn rejected_filter_graph_falls_back_to_concat() {
    let dir = TempDir::new().unwrap();
    let (request, images) = request(dir.path()).await;

    let outcome = compose(&runner(Encoder::RejectsFilterGraph), &request)
        .await
        .unwrap();

    assert!(outcome.used_fallback);
    assert_eq!(outcome.path, request.output);
    assert_eq!(std::fs::read(&outcome.path).unwrap(), b"rendered");

    let calls = calls(&request.output);
    assert_eq!(calls.len(), 2);
    assert!(calls[0].contains("-filter_complex"));
    assert!(calls[1].contains("-f concat"));
    assert!(!calls[1].contains("-filter_complex"));
    // Same single silent audio input on both paths
    assert_eq!(calls[1].matches("anullsrc").count(), 1);

    let list = std::fs::read_to_string(dir.path().join("scratch").join("slides_concat.txt")).unwrap();
    assert!(list.contains(&format!("file '{}'", images[0].display())));
    assert!(list.contains("duration 1.500"));
}

#[tokio::test]
async fn healthy_encoder_skips_fallback() {
    let dir = TempDir::new().unwrap();
    let (request, _) = request(dir.path()).await;

    let outcome = compose(&runner(Encoder::Healthy), &request).await.unwrap();

    assert!(!outcome.used_fallback);
    assert_eq!(calls(&request.output).len(), 1);
}

#[tokio::test]
async fn fallback_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let (request, _) = request(dir.path()).await;

    let err = compose(&runner(Encoder::Broken), &request).await.unwrap_err();

    assert!(err.is_encoding_failure());
    assert_eq!(calls(&request.output).len(), 2);
}

#[tokio::test]
async fn loop_flag_controls_truncation() {
    let dir = TempDir::new().unwrap();
    let video = dir.path().join("v.mp4");
    let audio = dir.path().join("a.mp3");
    std::fs::write(&video, b"v").unwrap();
    std::fs::write(&audio, b"a").unwrap();
    let compositor = FfmpegCompositor::with_runner(runner(Encoder::Healthy));
    let (short, full) = (dir.path().join("short.mp4"), dir.path().join("full.mp4"));

    tokio_test::assert_ok!(
        compositor
            .mux_narration(&video, &audio, &short, true)
            .await
    );
    tokio_test::assert_ok!(
        compositor
            .mux_narration(&video, &audio, &full, false)
            .await
    );

    assert!(calls(&short)[0].contains("-shortest"));
    assert!(!calls(&full)[0].contains("-shortest"));
    assert_eq!(std::fs::read(&full).unwrap(), b"rendered");
}
