//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::warn;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Duration reported when probing fails.
pub const DEFAULT_DURATION: f64 = 10.0;
/// Width reported when probing fails.
pub const DEFAULT_WIDTH: u32 = 1080;
/// Height reported when probing fails.
pub const DEFAULT_HEIGHT: u32 = 1920;
/// Container reported when probing fails.
pub const DEFAULT_FORMAT: &str = "mp4";

/// Basic media file metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Container short name (e.g. "mp4", "mp3", "wav")
    pub format: String,
}

impl Default for MediaMetadata {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            format: DEFAULT_FORMAT.to_string(),
        }
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe a media file, surfacing every failure.
pub async fn try_probe(path: impl AsRef<Path>) -> MediaResult<MediaMetadata> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ProbeFailed {
            message: format!("FFprobe exited with {:?}", output.status.code()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaMetadata> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::ProbeFailed {
            message: "No duration in probe output".to_string(),
            stderr: None,
        })?;

    let video = probe.streams.iter().find(|s| s.codec_type == "video");

    Ok(MediaMetadata {
        duration,
        width: video.and_then(|s| s.width).unwrap_or(DEFAULT_WIDTH),
        height: video.and_then(|s| s.height).unwrap_or(DEFAULT_HEIGHT),
        format: probe
            .format
            .format_name
            .as_deref()
            .map(short_format_name)
            .unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
    })
}

/// `"mov,mp4,m4a,3gp,3g2,mj2"` -> `"mp4"`; otherwise the first listed name.
fn short_format_name(name: &str) -> String {
    if name.split(',').any(|n| n == "mp4") {
        return "mp4".to_string();
    }
    name.split(',').next().unwrap_or(DEFAULT_FORMAT).to_string()
}

/// Probe a media file. Never fails: any probe error yields the documented
/// defaults (10 s, 1080x1920, mp4).
pub async fn probe_metadata(path: impl AsRef<Path>) -> MediaMetadata {
    let path = path.as_ref();
    match try_probe(path).await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Probe failed, using default metadata");
            MediaMetadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_output() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 720, "height": 1280}
            ],
            "format": {"duration": "12.480000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
        }"#;

        let meta = parse_probe_output(json).unwrap();
        assert!((meta.duration - 12.48).abs() < 1e-6);
        assert_eq!((meta.width, meta.height), (720, 1280));
        assert_eq!(meta.format, "mp4");
    }

    #[test]
    fn test_parse_audio_only_output() {
        let json = br#"{
            "streams": [{"codec_type": "audio"}],
            "format": {"duration": "3.5", "format_name": "mp3"}
        }"#;

        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.duration, 3.5);
        assert_eq!(meta.width, DEFAULT_WIDTH);
        assert_eq!(meta.format, "mp3");
    }

    #[test]
    fn test_missing_duration_is_error() {
        let json = br#"{"streams": [], "format": {"format_name": "wav"}}"#;
        tokio_test::assert_err!(parse_probe_output(json));
    }

    #[tokio::test]
    async fn test_probe_missing_file_defaults() {
        let meta = probe_metadata("/definitely/not/here.mp4").await;
        assert_eq!(meta, MediaMetadata::default());
    }

    #[tokio::test]
    async fn test_probe_garbage_file_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("garbage.mp4");
        tokio::fs::write(&path, b"not a video").await.unwrap();

        let meta = probe_metadata(&path).await;
        assert_eq!(meta.duration, DEFAULT_DURATION);
        assert_eq!((meta.width, meta.height), (1080, 1920));
    }
}
