use reelgen_models::{SpeechProviderKind, VoiceOptions};
use reelgen_resilience::ResilienceMonitor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::chunk::split_text;
use super::{AudioFormat, SpeechProvider};
use crate::error::{ChainError, ChainResult, ProviderError, ProviderResult};

/// Audio returned by the chain and the provider that produced it.
#[derive(Debug, Clone)]
pub struct SynthesizedSpeech {
    pub audio: Vec<u8>,
    pub provider: SpeechProviderKind,
    pub format: AudioFormat,
}

/// Narration written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechOutput {
    pub path: PathBuf,
    pub provider: SpeechProviderKind,
    pub format: AudioFormat,
    pub bytes: usize,
}

/// Preferred provider first, then the default provider.
pub struct SpeechChain {
    providers: Vec<Arc<dyn SpeechProvider>>,
    default_provider: SpeechProviderKind,
    monitor: Option<ResilienceMonitor>,
}

impl std::fmt::Debug for SpeechChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechChain")
            .field("providers", &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("default_provider", &self.default_provider)
            .finish()
    }
}

impl SpeechChain {
    /// Chain over the configured providers; Google TTS is the default.
    pub fn new(providers: Vec<Arc<dyn SpeechProvider>>) -> Self {
        Self {
            providers,
            default_provider: SpeechProviderKind::default(),
            monitor: None,
        }
    }

    pub fn with_default(mut self, kind: SpeechProviderKind) -> Self {
        self.default_provider = kind;
        self
    }

    /// Report provider errors to `monitor` and consult its degraded set.
    pub fn with_monitor(mut self, monitor: ResilienceMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn provider(&self, kind: SpeechProviderKind) -> Option<&Arc<dyn SpeechProvider>> {
        self.providers.iter().find(|p| p.kind() == kind)
    }

    /// Providers tried for `preferred`, degraded ones last.
    pub fn attempt_order(&self, preferred: SpeechProviderKind) -> Vec<SpeechProviderKind> {
        let mut kinds = vec![preferred];
        if self.default_provider != preferred {
            kinds.push(self.default_provider);
        }
        // Stable: healthy providers keep their relative order
        kinds.sort_by_key(|kind| self.is_degraded(kind.as_str()));
        kinds
    }

    fn is_degraded(&self, service: &str) -> bool {
        self.monitor
            .as_ref()
            .map(|m| m.is_degraded(service))
            .unwrap_or(false)
    }

    /// Synthesize `text`, falling back through the provider order.
    pub async fn synthesize(&self, text: &str, voice: &VoiceOptions) -> ChainResult<SynthesizedSpeech> {
        if text.trim().is_empty() {
            return Err(ChainError::EmptyText);
        }

        let mut errors: Vec<(String, String)> = Vec::new();
        for kind in self.attempt_order(voice.provider) {
            let Some(provider) = self.provider(kind) else {
                debug!(provider = kind.as_str(), "Speech provider not configured, skipping");
                errors.push((kind.as_str().to_string(), "provider not configured".to_string()));
                continue;
            };

            match synthesize_with(provider.as_ref(), text, &voice.voice_id).await {
                Ok(audio) => {
                    info!(
                        provider = provider.name(),
                        bytes = audio.len(),
                        fallback = kind != voice.provider,
                        "Narration synthesized"
                    );
                    return Ok(SynthesizedSpeech {
                        audio,
                        provider: kind,
                        format: provider.audio_format(),
                    });
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Speech provider failed");
                    metrics::counter!("reelgen_provider_failures_total", "provider" => provider.name().to_string())
                        .increment(1);
                    if let Some(monitor) = &self.monitor {
                        monitor.handle_service_error(provider.name(), &e.to_string(), e.error_type());
                    }
                    errors.push((provider.name().to_string(), e.to_string()));
                }
            }
        }

        Err(ChainError::AllProvidersExhausted(errors))
    }

    /// Synthesize into `dir/narration.<ext>`.
    pub async fn synthesize_to(&self, text: &str, voice: &VoiceOptions, dir: &Path) -> ChainResult<SpeechOutput> {
        let speech = self.synthesize(text, voice).await?;
        let path = dir.join(format!("narration.{}", speech.format.extension()));
        tokio::fs::write(&path, &speech.audio).await?;
        Ok(SpeechOutput {
            path,
            provider: speech.provider,
            format: speech.format,
            bytes: speech.audio.len(),
        })
    }
}

/// Chunk, synthesize in order, concatenate.
async fn synthesize_with(provider: &dyn SpeechProvider, text: &str, voice_id: &str) -> ProviderResult<Vec<u8>> {
    let voice = provider.resolve_voice(voice_id);
    let chunks = split_text(text, provider.max_request_len());
    if chunks.len() > 1 {
        debug!(provider = provider.name(), chunks = chunks.len(), "Splitting narration");
    }

    let mut audio = Vec::new();
    for chunk in &chunks {
        audio.extend(provider.synthesize(chunk, voice).await?);
    }
    if audio.is_empty() {
        return Err(ProviderError::EmptyAudio {
            service: provider.name().to_string(),
        });
    }
    Ok(audio)
}
