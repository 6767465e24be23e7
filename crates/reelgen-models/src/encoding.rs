//! Video encoding configuration and quality lookup tables.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Output frame rate for slideshows
pub const DEFAULT_FPS: u32 = 30;
/// Audio sample rate used for generated silent tracks
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Named quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl QualityTier {
    /// Parse a tier name, falling back to `Medium` for anything unrecognized.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => QualityTier::Low,
            "medium" => QualityTier::Medium,
            "high" => QualityTier::High,
            "ultra" => QualityTier::Ultra,
            _ => QualityTier::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target platform, which fixes the output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Tiktok,
    InstagramReels,
    YoutubeShorts,
    Youtube,
    InstagramFeed,
}

/// Orientation derived from a platform's resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
    Square,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
            Orientation::Square => "square",
        }
    }
}

impl Platform {
    /// Parse a platform name, falling back to `Tiktok` for anything unrecognized.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "tiktok" => Platform::Tiktok,
            "instagram_reels" | "reels" | "instagram" => Platform::InstagramReels,
            "youtube_shorts" | "shorts" => Platform::YoutubeShorts,
            "youtube" => Platform::Youtube,
            "instagram_feed" | "square" => Platform::InstagramFeed,
            _ => Platform::default(),
        }
    }

    /// Output resolution (width, height) for the platform.
    pub fn resolution(&self) -> Resolution {
        match self {
            Platform::Tiktok | Platform::InstagramReels | Platform::YoutubeShorts => {
                Resolution::new(1080, 1920)
            }
            Platform::Youtube => Resolution::new(1920, 1080),
            Platform::InstagramFeed => Resolution::new(1080, 1080),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.resolution().orientation()
    }
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn orientation(&self) -> Orientation {
        use std::cmp::Ordering;
        match self.width.cmp(&self.height) {
            Ordering::Less => Orientation::Portrait,
            Ordering::Greater => Orientation::Landscape,
            Ordering::Equal => Orientation::Square,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Platform::default().resolution()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Bitrate and encoder preset for a tier/platform pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QualityProfile {
    /// Target video bitrate (FFmpeg syntax, e.g. "4M")
    pub video_bitrate: String,
    /// x264 preset
    pub preset: String,
}

/// Look up the bitrate/preset for a tier on a platform.
///
/// Landscape output carries more pixels per frame than the vertical formats,
/// so the YouTube column runs a step higher.
pub fn quality_profile(tier: QualityTier, platform: Platform) -> QualityProfile {
    let (bitrate, preset) = match (tier, platform) {
        (QualityTier::Low, Platform::Youtube) => ("2M", "veryfast"),
        (QualityTier::Low, Platform::InstagramFeed) => ("1M", "veryfast"),
        (QualityTier::Low, _) => ("1500k", "veryfast"),
        (QualityTier::Medium, Platform::Youtube) => ("5M", "medium"),
        (QualityTier::Medium, Platform::InstagramFeed) => ("2500k", "medium"),
        (QualityTier::Medium, _) => ("4M", "medium"),
        (QualityTier::High, Platform::Youtube) => ("8M", "slow"),
        (QualityTier::High, Platform::InstagramFeed) => ("4M", "slow"),
        (QualityTier::High, _) => ("6M", "slow"),
        (QualityTier::Ultra, Platform::Youtube) => ("12M", "slower"),
        (QualityTier::Ultra, Platform::InstagramFeed) => ("6M", "slower"),
        (QualityTier::Ultra, _) => ("10M", "slower"),
    };
    QualityProfile {
        video_bitrate: bitrate.to_string(),
        preset: preset.to_string(),
    }
}

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Target video bitrate
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    quality_profile(QualityTier::Medium, Platform::Tiktok).preset
}
fn default_video_bitrate() -> String {
    quality_profile(QualityTier::Medium, Platform::Tiktok).video_bitrate
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_fps() -> u32 {
    DEFAULT_FPS
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::for_quality(QualityTier::default(), Platform::default())
    }
}

impl EncodingConfig {
    /// Build an encoding config from the quality table.
    pub fn for_quality(tier: QualityTier, platform: Platform) -> Self {
        let profile = quality_profile(tier, platform);
        Self {
            codec: default_video_codec(),
            preset: profile.preset,
            video_bitrate: profile.video_bitrate,
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            fps: DEFAULT_FPS,
            extra_args: Vec::new(),
        }
    }

    /// Video-side FFmpeg output arguments.
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-b:v".to_string(),
            self.video_bitrate.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            self.fps.to_string(),
        ];
        args.extend(self.extra_args.clone());
        args
    }

    /// Audio-side FFmpeg output arguments.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args
    }
}
