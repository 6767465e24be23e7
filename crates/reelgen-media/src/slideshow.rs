//! Slideshow composition.
//!
//! The primary path renders every slide through its own filter chain
//! (scale/pad, Ken Burns, grade, text, fades) and concatenates them in one
//! filter graph. If that encode fails, a plain concat-demuxer pass with the
//! same audio input produces the video without per-slide effects.

use reelgen_models::{EncodingConfig, Resolution, SlideStyle, DEFAULT_SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{self, wrap_text, wrap_width};
use crate::fs_utils::require_files;

/// One still image shown for a fixed duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub image: PathBuf,
    /// Seconds on screen
    pub duration: f64,
    /// Overlay text drawn at the style's text position
    #[serde(default)]
    pub text: Option<String>,
}

impl Slide {
    pub fn new(image: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            image: image.into(),
            duration,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = (!text.trim().is_empty()).then_some(text);
        self
    }
}

/// Everything needed to render a slideshow.
#[derive(Debug, Clone)]
pub struct SlideshowRequest {
    pub slides: Vec<Slide>,
    pub output: PathBuf,
    pub resolution: Resolution,
    pub style: SlideStyle,
    pub encoding: EncodingConfig,
    /// Narration used as the single audio input; silence when absent
    pub audio: Option<PathBuf>,
    /// Scratch directory for text and list files (defaults to the output's)
    pub work_dir: Option<PathBuf>,
}

impl SlideshowRequest {
    pub fn new(slides: Vec<Slide>, output: impl Into<PathBuf>, resolution: Resolution) -> Self {
        Self {
            slides,
            output: output.into(),
            resolution,
            style: SlideStyle::default(),
            encoding: EncodingConfig::default(),
            audio: None,
            work_dir: None,
        }
    }

    pub fn with_style(mut self, style: SlideStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_audio(mut self, audio: impl Into<PathBuf>) -> Self {
        self.audio = Some(audio.into());
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn total_duration(&self) -> f64 {
        self.slides.iter().map(|s| s.duration).sum()
    }

    fn scratch_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .or_else(|| self.output.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Reject empty or malformed requests and missing inputs before encoding.
    pub fn validate(&self) -> MediaResult<()> {
        if self.slides.is_empty() {
            return Err(MediaError::invalid_input("slideshow needs at least one slide"));
        }
        if let Some(bad) = self
            .slides
            .iter()
            .find(|s| !(s.duration.is_finite() && s.duration > 0.0))
        {
            return Err(MediaError::invalid_input(format!(
                "slide {} has invalid duration {}",
                bad.image.display(),
                bad.duration
            )));
        }
        require_files(self.slides.iter().map(|s| s.image.as_path()))?;
        if let Some(audio) = &self.audio {
            require_files([audio.as_path()])?;
        }
        Ok(())
    }

    fn audio_input(&self) -> FfmpegInput {
        match &self.audio {
            Some(path) => FfmpegInput::file(path),
            None => FfmpegInput::silence(self.total_duration(), DEFAULT_SAMPLE_RATE),
        }
    }
}

/// Which path produced the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeOutcome {
    pub path: PathBuf,
    pub used_fallback: bool,
}

/// Per-slide filter chain ending in `[v{index}]`.
fn slide_chain(index: usize, slide: &Slide, req: &SlideshowRequest, text_file: Option<&Path>) -> String {
    let res = req.resolution;
    let fps = req.encoding.fps;
    let mut parts = vec![filters::scale_pad(res)];

    if req.style.ken_burns {
        parts.push(filters::ken_burns(res, slide.duration, fps));
    } else {
        parts.push(format!("fps={fps}"));
    }
    if let Some(grade) = req.style.color_grade {
        parts.push(filters::color_grade_filter(grade).to_string());
    }
    if let Some(file) = text_file {
        parts.push(filters::drawtext(
            &file.to_string_lossy(),
            req.style.text_position,
            res,
        ));
    }
    if !req.style.transition.is_none() {
        if let Some(fade) = filters::fade_in_out(slide.duration, req.style.transition_duration) {
            parts.push(fade);
        }
    }
    parts.push(format!(
        "format=yuv420p,trim=duration={:.3},setpts=PTS-STARTPTS",
        slide.duration
    ));

    format!("[{index}:v]{}[v{index}]", parts.join(","))
}

/// Full filter graph: one chain per slide, then concat into `[vout]`.
pub fn build_filter_graph(req: &SlideshowRequest, text_files: &[Option<PathBuf>]) -> String {
    let mut graph: Vec<String> = req
        .slides
        .iter()
        .enumerate()
        .map(|(i, slide)| {
            let text = text_files.get(i).and_then(|t| t.as_deref());
            slide_chain(i, slide, req, text)
        })
        .collect();

    let labels: String = (0..req.slides.len()).map(|i| format!("[v{i}]")).collect();
    graph.push(format!("{labels}concat=n={}:v=1:a=0[vout]", req.slides.len()));
    graph.join(";")
}

/// Primary single-pass command.
pub fn build_primary_command(req: &SlideshowRequest, text_files: &[Option<PathBuf>]) -> FfmpegCommand {
    let fps = req.encoding.fps;
    let mut cmd = FfmpegCommand::new(&req.output);
    for slide in &req.slides {
        cmd = cmd.input(FfmpegInput::looped_image(&slide.image, slide.duration, fps));
    }
    let audio_index = req.slides.len();
    cmd.input(req.audio_input())
        .filter_complex(build_filter_graph(req, text_files))
        .map("[vout]")
        .map(format!("{audio_index}:a"))
        .output_args(req.encoding.to_ffmpeg_args())
        .duration(req.total_duration())
        .faststart()
}

/// Concat-demuxer list with a fixed duration per entry.
///
/// Entries are absolute: the demuxer resolves relative entries against the
/// list file's directory. The last file is listed twice so its duration is
/// honored.
pub fn concat_list_contents(slides: &[Slide]) -> String {
    let mut out = String::new();
    for slide in slides {
        out.push_str(&format!("file '{}'\n", escape_list_path(&slide.image)));
        out.push_str(&format!("duration {:.3}\n", slide.duration));
    }
    if let Some(last) = slides.last() {
        out.push_str(&format!("file '{}'\n", escape_list_path(&last.image)));
    }
    out
}

fn escape_list_path(path: &Path) -> String {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    path.to_string_lossy().replace('\'', "'\\''")
}

/// Fallback command: concat demuxer, scale/pad only, same audio input.
pub fn build_fallback_command(req: &SlideshowRequest, list_path: &Path) -> FfmpegCommand {
    let fps = req.encoding.fps;
    FfmpegCommand::new(&req.output)
        .input(FfmpegInput::concat_list(list_path))
        .input(req.audio_input())
        .output_arg("-vf")
        .output_arg(format!("{},fps={fps},format=yuv420p", filters::scale_pad(req.resolution)))
        .map("0:v")
        .map("1:a")
        .output_args(req.encoding.to_ffmpeg_args())
        .duration(req.total_duration())
        .faststart()
}

async fn write_text_files(req: &SlideshowRequest, dir: &Path) -> MediaResult<Vec<Option<PathBuf>>> {
    let width = wrap_width(req.resolution);
    let mut files = Vec::with_capacity(req.slides.len());
    for (i, slide) in req.slides.iter().enumerate() {
        match &slide.text {
            Some(text) => {
                let path = dir.join(format!("slide_{i:03}.txt"));
                tokio::fs::write(&path, wrap_text(text, width)).await?;
                files.push(Some(path));
            }
            None => files.push(None),
        }
    }
    Ok(files)
}

/// Render the slideshow, falling back to the concat demuxer on encoding
/// failure.
pub async fn compose(runner: &FfmpegRunner, req: &SlideshowRequest) -> MediaResult<ComposeOutcome> {
    req.validate()?;

    let scratch = req.scratch_dir();
    tokio::fs::create_dir_all(&scratch).await?;
    if let Some(parent) = req.output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let text_files = write_text_files(req, &scratch).await?;
    let primary = build_primary_command(req, &text_files);

    info!(
        slides = req.slides.len(),
        duration = req.total_duration(),
        resolution = %req.resolution,
        "Composing slideshow"
    );

    match runner.run(&primary).await {
        Ok(()) => {
            return Ok(ComposeOutcome {
                path: req.output.clone(),
                used_fallback: false,
            })
        }
        Err(e) if e.is_encoding_failure() => {
            let stderr = match &e {
                MediaError::EncodingFailed { stderr, .. } => stderr.as_deref().unwrap_or(""),
                _ => "",
            };
            warn!(
                error = %e,
                stderr = stderr,
                "Slideshow encode failed, retrying with concat demuxer"
            );
            metrics::counter!("reelgen_compositor_fallbacks_total").increment(1);
        }
        Err(e) => return Err(e),
    }

    let list_path = scratch.join("slides_concat.txt");
    tokio::fs::write(&list_path, concat_list_contents(&req.slides)).await?;
    runner.run(&build_fallback_command(req, &list_path)).await?;

    Ok(ComposeOutcome {
        path: req.output.clone(),
        used_fallback: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgen_models::{ColorGrade, TextPosition, Transition};

    fn request(slides: Vec<Slide>) -> SlideshowRequest {
        SlideshowRequest::new(slides, "/tmp/out/slideshow.mp4", Resolution::new(1080, 1920))
    }

    #[test]
    fn test_filter_graph_has_chain_per_slide() {
        let mut req = request(vec![Slide::new("a.png", 2.0), Slide::new("b.png", 3.0)]);
        req.style = SlideStyle {
            color_grade: Some(ColorGrade::Sepia),
            ken_burns: true,
            text_position: TextPosition::Bottom,
            transition: Transition::Dissolve,
            transition_duration: 0.5,
        };

        let graph = build_filter_graph(&req, &[Some(PathBuf::from("/w/slide_000.txt")), None]);

        assert!(graph.starts_with("[0:v]scale=1080:1920"));
        assert!(graph.contains("[1:v]scale=1080:1920"));
        assert_eq!(graph.matches("zoompan").count(), 2);
        assert_eq!(graph.matches("colorchannelmixer").count(), 2);
        assert_eq!(graph.matches("drawtext").count(), 1);
        assert_eq!(graph.matches("fade=t=in").count(), 2);
        assert!(graph.ends_with("[v0][v1]concat=n=2:v=1:a=0[vout]"));
    }

    #[test]
    fn test_plain_style_has_no_effects() {
        let mut req = request(vec![Slide::new("a.png", 2.0)]);
        req.style = SlideStyle::plain();

        let graph = build_filter_graph(&req, &[None]);

        assert!(!graph.contains("zoompan"));
        assert!(!graph.contains("fade"));
        assert!(graph.contains("fps=30"));
    }

    #[test]
    fn test_primary_has_exactly_one_audio_input() {
        let req = request(vec![Slide::new("a.png", 2.0), Slide::new("b.png", 2.5)]);
        let cmd = build_primary_command(&req, &[None, None]);
        let args = cmd.build_args();

        assert_eq!(cmd.input_count(), 3);
        assert_eq!(args.iter().filter(|a| a.starts_with("anullsrc")).count(), 1);
        assert!(args.contains(&"2:a".to_string()));
        assert!(args.contains(&"4.500".to_string()));

        let with_audio = req.clone().with_audio("/w/narration.mp3");
        let args = build_primary_command(&with_audio, &[None, None]).build_args();
        assert!(!args.iter().any(|a| a.starts_with("anullsrc")));
        assert!(args.contains(&"/w/narration.mp3".to_string()));
    }

    #[test]
    fn test_concat_list_repeats_last_file() {
        let list = concat_list_contents(&[Slide::new("/w/a.png", 2.0), Slide::new("/w/it's.png", 1.5)]);

        assert_eq!(
            list,
            "file '/w/a.png'\nduration 2.000\nfile '/w/it'\\''s.png'\nduration 1.500\nfile '/w/it'\\''s.png'\n"
        );
    }

    #[test]
    fn test_concat_list_entries_are_absolute() {
        let list = concat_list_contents(&[Slide::new("work/job/image_00.png", 2.0)]);
        let cwd = std::env::current_dir().unwrap();
        let expected = cwd.join("work/job/image_00.png");

        for line in list.lines().filter(|l| l.starts_with("file ")) {
            let entry = line.trim_start_matches("file '").trim_end_matches('\'');
            assert!(Path::new(entry).is_absolute(), "{entry}");
            assert_eq!(Path::new(entry), expected);
        }
    }

    #[test]
    fn test_fallback_uses_concat_and_same_audio() {
        let req = request(vec![Slide::new("a.png", 2.0)]).with_audio("/w/n.mp3");
        let args = build_fallback_command(&req, Path::new("/w/list.txt")).build_args();

        assert!(args.contains(&"concat".to_string()));
        assert!(args.contains(&"/w/n.mp3".to_string()));
        assert!(!args.iter().any(|a| a.contains("zoompan")));
    }

    #[test]
    fn test_validate_reports_missing_image() {
        let req = request(vec![Slide::new("/definitely/missing.png", 2.0)]);
        assert!(req.validate().unwrap_err().is_resource_missing());

        let empty = request(vec![]);
        assert!(matches!(empty.validate(), Err(MediaError::InvalidInput(_))));
    }

    #[test]
    fn test_slide_blank_text_is_dropped() {
        assert!(Slide::new("a.png", 1.0).with_text("   ").text.is_none());
        assert!(Slide::new("a.png", 1.0).with_text("hi").text.is_some());
    }
}
