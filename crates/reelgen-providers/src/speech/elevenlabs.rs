//! ElevenLabs text-to-speech.

use async_trait::async_trait;
use reelgen_models::SpeechProviderKind;
use serde::Serialize;

use super::SpeechProvider;
use crate::error::ProviderResult;
use crate::http::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_MODEL: &str = "eleven_multilingual_v2";
const MAX_REQUEST_LEN: usize = 5000;

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: DEFAULT_MODEL.to_string(),
        }
    }

    /// `ELEVENLABS_API_KEY` (required), `ELEVENLABS_BASE_URL`, `ELEVENLABS_MODEL`.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ELEVENLABS_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("ELEVENLABS_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("ELEVENLABS_MODEL") {
            config.model_id = model;
        }
        Some(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

pub struct ElevenLabsProvider {
    config: ElevenLabsConfig,
    http: HttpTransport,
}

impl ElevenLabsProvider {
    pub fn new(config: ElevenLabsConfig, http: HttpTransport) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl SpeechProvider for ElevenLabsProvider {
    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::Elevenlabs
    }

    fn max_request_len(&self) -> usize {
        MAX_REQUEST_LEN
    }

    async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>> {
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            voice
        );
        let body = SynthesisRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        self.http
            .fetch_bytes(self.name(), |client| {
                client
                    .post(&url)
                    .header("xi-api-key", &self.config.api_key)
                    .header("Accept", "audio/mpeg")
                    .json(&body)
            })
            .await
    }
}
