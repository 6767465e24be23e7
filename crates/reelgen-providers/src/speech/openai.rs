//! OpenAI speech endpoint.

use async_trait::async_trait;
use reelgen_models::SpeechProviderKind;
use serde::Serialize;

use super::SpeechProvider;
use crate::error::ProviderResult;
use crate::http::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "tts-1";
const MAX_REQUEST_LEN: usize = 4096;

#[derive(Debug, Clone)]
pub struct OpenAiTtsConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl OpenAiTtsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// `OPENAI_API_KEY` (required), `OPENAI_BASE_URL`, `OPENAI_TTS_MODEL`.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("OPENAI_TTS_MODEL") {
            config.model = model;
        }
        Some(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

pub struct OpenAiTtsProvider {
    config: OpenAiTtsConfig,
    http: HttpTransport,
}

impl OpenAiTtsProvider {
    pub fn new(config: OpenAiTtsConfig, http: HttpTransport) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl SpeechProvider for OpenAiTtsProvider {
    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::Openai
    }

    fn max_request_len(&self) -> usize {
        MAX_REQUEST_LEN
    }

    async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>> {
        let url = format!("{}/v1/audio/speech", self.config.base_url.trim_end_matches('/'));
        let body = SpeechRequest {
            model: &self.config.model,
            input: text,
            voice,
            response_format: "mp3",
        };

        self.http
            .fetch_bytes(self.name(), |client| {
                client
                    .post(&url)
                    .bearer_auth(&self.config.api_key)
                    .json(&body)
            })
            .await
    }
}
