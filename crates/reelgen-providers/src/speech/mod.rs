//! Speech synthesis providers and the fallback chain over them.

mod chain;
mod chunk;
mod elevenlabs;
mod espeak;
mod google_tts;
mod openai;
mod voices;

pub use chain::{SpeechChain, SpeechOutput, SynthesizedSpeech};
pub use chunk::split_text;
pub use elevenlabs::{ElevenLabsConfig, ElevenLabsProvider};
pub use espeak::EspeakProvider;
pub use google_tts::{GoogleTtsConfig, GoogleTtsProvider};
pub use openai::{OpenAiTtsConfig, OpenAiTtsProvider};
pub use voices::{default_voice, resolve_voice, VOICE_IDS};

use async_trait::async_trait;
use reelgen_models::SpeechProviderKind;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};

/// Phrase synthesized by the default health check.
pub const HEALTH_CHECK_PHRASE: &str = "Health check.";

/// Container of the bytes a provider returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

/// One text-to-speech backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn kind(&self) -> SpeechProviderKind;

    /// Service name used for breakers and health records.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Longest text accepted in a single request, in characters.
    fn max_request_len(&self) -> usize;

    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    /// Native voice name for an abstract voice id.
    fn resolve_voice(&self, voice_id: &str) -> &'static str {
        resolve_voice(self.kind(), voice_id)
    }

    /// Synthesize one request-sized piece of text with a native voice.
    async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>>;

    /// Cheap end-to-end probe.
    async fn health_check(&self) -> ProviderResult<()> {
        let voice = default_voice(self.kind());
        let audio = self.synthesize(HEALTH_CHECK_PHRASE, voice).await?;
        if audio.is_empty() {
            return Err(ProviderError::EmptyAudio {
                service: self.name().to_string(),
            });
        }
        Ok(())
    }
}
