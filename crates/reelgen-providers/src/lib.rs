//! External content providers for the reelgen pipeline.
//!
//! - [`speech`]: text-to-speech providers and the [`SpeechChain`] fallback
//! - [`images`]: stock image search, local assets and placeholders via [`ImageChain`]
//! - [`health`]: health tests for the resilience monitor
//!
//! HTTP providers share one [`HttpTransport`], so every request passes
//! through the per-service circuit breakers.

pub mod error;
pub mod health;
pub mod http;
pub mod images;
pub mod speech;

pub use error::{ChainError, ChainResult, ProviderError, ProviderResult};
pub use http::HttpTransport;
pub use images::{AcquiredImage, ImageChain, ImageRequest, ImageSearchProvider, ImageSource};
pub use speech::{AudioFormat, SpeechChain, SpeechOutput, SpeechProvider, SynthesizedSpeech};
