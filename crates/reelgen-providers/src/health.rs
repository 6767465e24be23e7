//! Health tests for registering providers with the resilience monitor.

use reelgen_models::{Orientation, SpeechProviderKind, TestResult, VoiceOptions};
use reelgen_resilience::{health_test_fn, HealthTest};
use serde_json::Value;
use std::sync::Arc;

use crate::images::ImageSearchProvider;
use crate::speech::{SpeechChain, SpeechProvider};

/// Probe one speech provider with its own health check.
pub fn speech_provider_test(provider: Arc<dyn SpeechProvider>) -> Arc<dyn HealthTest> {
    health_test_fn(move |_options: Option<Value>| {
        let provider = provider.clone();
        async move {
            Ok(match provider.health_check().await {
                Ok(()) => TestResult::success(),
                Err(e) => TestResult::failure(e.to_string()),
            })
        }
    })
}

/// Run a short synthesis through the whole chain; a provider other than the
/// preferred one is recorded as a fallback.
///
/// Options: `{"text": "...", "provider": "elevenlabs", "voice_id": "calm"}`.
pub fn speech_chain_test(chain: Arc<SpeechChain>) -> Arc<dyn HealthTest> {
    health_test_fn(move |options: Option<Value>| {
        let chain = chain.clone();
        async move {
            let field = |name: &str| {
                options
                    .as_ref()
                    .and_then(|o| o.get(name))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            let text = field("text").unwrap_or_else(|| "System check.".to_string());
            let mut voice = VoiceOptions::default();
            if let Some(provider) = field("provider") {
                voice.provider = provider.parse::<SpeechProviderKind>()?;
            }
            if let Some(voice_id) = field("voice_id") {
                voice.voice_id = voice_id;
            }

            Ok(match chain.synthesize(&text, &voice).await {
                Ok(speech) if speech.provider != voice.provider => {
                    TestResult::success().with_fallback(speech.provider.as_str())
                }
                Ok(_) => TestResult::success(),
                Err(e) => TestResult::failure(e.to_string()),
            })
        }
    })
}

/// Search for a fixed query and require at least one usable result.
///
/// Options: `{"query": "..."}`.
pub fn image_search_test(provider: Arc<dyn ImageSearchProvider>) -> Arc<dyn HealthTest> {
    health_test_fn(move |options: Option<Value>| {
        let provider = provider.clone();
        async move {
            let query = options
                .as_ref()
                .and_then(|o| o.get("query"))
                .and_then(Value::as_str)
                .unwrap_or("nature")
                .to_string();

            Ok(match provider.search(&query, 1, Orientation::Portrait).await {
                Ok(urls) if urls.iter().any(|u| crate::http::is_usable_url(u)) => TestResult::success(),
                Ok(_) => TestResult::failure(format!("{} returned no usable results", provider.name())),
                Err(e) => TestResult::failure(e.to_string()),
            })
        }
    })
}
