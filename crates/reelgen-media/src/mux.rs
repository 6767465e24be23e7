//! Narration muxing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use crate::error::MediaResult;
use crate::fs_utils::require_files;
use reelgen_models::{DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC};

/// How the audio track is fitted to the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFit {
    /// Stop at the shorter of the two streams.
    #[default]
    Shortest,
    /// Keep both streams whole; the output lasts as long as the longer one.
    Full,
    /// Repeat the audio under the whole video.
    Loop,
}

impl AudioFit {
    /// Map the `loop_audio` flag of [`mux_narration`].
    ///
    /// `true` means shortest-stream truncation, not looping; `false` keeps
    /// the full length of both streams.
    pub fn from_loop_flag(loop_audio: bool) -> Self {
        if loop_audio {
            AudioFit::Shortest
        } else {
            AudioFit::Full
        }
    }

    /// Whether the output is cut at the end of the shorter stream.
    fn truncates(self) -> bool {
        matches!(self, AudioFit::Shortest | AudioFit::Loop)
    }
}

/// Build the mux command: video stream copied, audio re-encoded.
pub fn build_mux_command(video: &Path, audio: &Path, output: &Path, fit: AudioFit) -> FfmpegCommand {
    let audio_input = match fit {
        AudioFit::Shortest | AudioFit::Full => FfmpegInput::file(audio),
        AudioFit::Loop => FfmpegInput::file(audio).looped(),
    };

    let cmd = FfmpegCommand::new(output)
        .input_file(video)
        .input(audio_input)
        .map("0:v:0")
        .map("1:a:0")
        .video_codec("copy")
        .audio_codec(DEFAULT_AUDIO_CODEC)
        .audio_bitrate(DEFAULT_AUDIO_BITRATE);
    let cmd = if fit.truncates() { cmd.shortest() } else { cmd };
    cmd.faststart()
}

/// Replace the video's audio with `audio`.
pub async fn mux_narration(
    runner: &FfmpegRunner,
    video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
    loop_audio: bool,
) -> MediaResult<()> {
    mux_with_fit(runner, video, audio, output, AudioFit::from_loop_flag(loop_audio)).await
}

/// Replace the video's audio with `audio` using an explicit fit mode.
pub async fn mux_with_fit(
    runner: &FfmpegRunner,
    video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
    fit: AudioFit,
) -> MediaResult<()> {
    let (video, audio, output) = (video.as_ref(), audio.as_ref(), output.as_ref());
    require_files([video, audio])?;

    info!(
        video = %video.display(),
        audio = %audio.display(),
        fit = ?fit,
        "Muxing narration"
    );
    runner.run(&build_mux_command(video, audio, output, fit)).await
}
