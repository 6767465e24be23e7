//! Google Translate TTS. Keyless; the voice is a language tag.

use async_trait::async_trait;
use reelgen_models::SpeechProviderKind;

use super::SpeechProvider;
use crate::error::ProviderResult;
use crate::http::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://translate.google.com";
/// The endpoint rejects longer queries.
const MAX_REQUEST_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct GoogleTtsConfig {
    pub base_url: String,
}

impl Default for GoogleTtsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl GoogleTtsConfig {
    /// `GOOGLE_TTS_BASE_URL` overrides the endpoint.
    pub fn from_env() -> Self {
        std::env::var("GOOGLE_TTS_BASE_URL")
            .map(|base_url| Self { base_url })
            .unwrap_or_default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub struct GoogleTtsProvider {
    config: GoogleTtsConfig,
    http: HttpTransport,
}

impl GoogleTtsProvider {
    pub fn new(config: GoogleTtsConfig, http: HttpTransport) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl SpeechProvider for GoogleTtsProvider {
    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::GoogleTts
    }

    fn max_request_len(&self) -> usize {
        MAX_REQUEST_LEN
    }

    async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>> {
        let url = format!("{}/translate_tts", self.config.base_url.trim_end_matches('/'));
        let total = text.chars().count().to_string();

        self.http
            .fetch_bytes(self.name(), |client| {
                client.get(&url).query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", voice),
                    ("q", text),
                    ("textlen", total.as_str()),
                ])
            })
            .await
    }
}
