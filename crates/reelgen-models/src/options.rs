//! Job submission options.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::encoding::{Platform, QualityTier};
use crate::style::SlideStyle;

/// Known speech synthesis providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeechProviderKind {
    Elevenlabs,
    Openai,
    #[default]
    GoogleTts,
    Espeak,
}

impl SpeechProviderKind {
    pub const ALL: &'static [SpeechProviderKind] = &[
        SpeechProviderKind::Elevenlabs,
        SpeechProviderKind::Openai,
        SpeechProviderKind::GoogleTts,
        SpeechProviderKind::Espeak,
    ];

    /// Service name used for breakers, health records and degraded state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeechProviderKind::Elevenlabs => "elevenlabs",
            SpeechProviderKind::Openai => "openai_tts",
            SpeechProviderKind::GoogleTts => "google_tts",
            SpeechProviderKind::Espeak => "espeak",
        }
    }
}

impl fmt::Display for SpeechProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SpeechProviderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "elevenlabs" | "eleven_labs" => Ok(SpeechProviderKind::Elevenlabs),
            "openai" | "openai_tts" => Ok(SpeechProviderKind::Openai),
            "google_tts" | "gtts" | "google" => Ok(SpeechProviderKind::GoogleTts),
            "espeak" | "espeak_ng" => Ok(SpeechProviderKind::Espeak),
            other => Err(ValidationError::invalid("voice.provider", other)),
        }
    }
}

/// Voice selection for narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VoiceOptions {
    /// Preferred provider
    #[serde(default)]
    pub provider: SpeechProviderKind,

    /// Abstract voice id, resolved per provider
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
}

fn default_voice_id() -> String {
    "default".to_string()
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            provider: SpeechProviderKind::default(),
            voice_id: default_voice_id(),
        }
    }
}

/// Options supplied with a job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobOptions {
    /// Video title
    #[serde(default)]
    pub title: String,

    /// Narration script; paragraphs are separated by blank lines
    #[serde(default)]
    pub script: String,

    /// Voice selection
    #[serde(default)]
    pub voice: VoiceOptions,

    /// Target platform (fixes the resolution)
    #[serde(default)]
    pub platform: Platform,

    /// Encoding quality tier
    #[serde(default)]
    pub quality: QualityTier,

    /// Slide styling
    #[serde(default)]
    pub style: SlideStyle,

    /// Caller-supplied background images
    #[serde(default)]
    pub images: Vec<PathBuf>,

    /// Stock photo query for slide backgrounds; text slides are generated
    /// locally when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_query: Option<String>,

    /// Caller-supplied narration audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,

    /// Fixed per-slide duration in seconds (otherwise derived from narration)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_duration: Option<f64>,
}

impl JobOptions {
    pub fn new(title: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            script: script.into(),
            voice: VoiceOptions::default(),
            platform: Platform::default(),
            quality: QualityTier::default(),
            style: SlideStyle::default(),
            images: Vec::new(),
            stock_query: None,
            audio: None,
            image_duration: None,
        }
    }

    pub fn with_voice(mut self, provider: SpeechProviderKind, voice_id: impl Into<String>) -> Self {
        self.voice = VoiceOptions {
            provider,
            voice_id: voice_id.into(),
        };
        self
    }

    pub fn with_style(mut self, style: SlideStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_images(mut self, images: Vec<PathBuf>) -> Self {
        self.images = images;
        self
    }

    pub fn with_stock_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.stock_query = (!query.trim().is_empty()).then_some(query);
        self
    }

    pub fn with_audio(mut self, audio: impl Into<PathBuf>) -> Self {
        self.audio = Some(audio.into());
        self
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::missing("title"));
        }
        if self.script.trim().is_empty() {
            return Err(ValidationError::missing("script"));
        }
        if let Some(duration) = self.image_duration {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(ValidationError::invalid("image_duration", duration.to_string()));
            }
        }
        Ok(())
    }
}

/// Rejected job input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    Missing(String),

    #[error("Invalid value for {field}: {value}")]
    Invalid { field: String, value: String },
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    pub fn invalid(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_title_and_script() {
        assert_eq!(
            JobOptions::new("  ", "script").validate(),
            Err(ValidationError::missing("title"))
        );
        assert_eq!(
            JobOptions::new("Title", "\n\n").validate(),
            Err(ValidationError::missing("script"))
        );
        tokio_test::assert_ok!(JobOptions::new("Title", "Script").validate());
    }

    #[test]
    fn test_validate_image_duration() {
        let mut options = JobOptions::new("Title", "Script");
        options.image_duration = Some(0.0);
        assert!(matches!(
            options.validate(),
            Err(ValidationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_deserialize_minimal() {
        let options: JobOptions =
            serde_json::from_str(r#"{"title":"T","script":"Line one."}"#).unwrap();
        assert_eq!(options.voice.provider, SpeechProviderKind::GoogleTts);
        assert_eq!(options.voice.voice_id, "default");
        assert_eq!(options.platform, Platform::Tiktok);
        assert!(options.images.is_empty());
        assert!(options.stock_query.is_none());
        assert!(options.audio.is_none());
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("gtts".parse::<SpeechProviderKind>().unwrap(), SpeechProviderKind::GoogleTts);
        assert_eq!("ElevenLabs".parse::<SpeechProviderKind>().unwrap(), SpeechProviderKind::Elevenlabs);
        tokio_test::assert_err!("polly".parse::<SpeechProviderKind>());
    }
}
