//! Local eSpeak NG synthesis.

use async_trait::async_trait;
use reelgen_models::SpeechProviderKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{AudioFormat, SpeechProvider};
use crate::error::{ProviderError, ProviderResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs `espeak-ng --stdout` and returns the WAV it writes.
///
/// WAV output is not byte-concatenable, so the whole script goes out in one
/// request.
#[derive(Debug, Clone)]
pub struct EspeakProvider {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl Default for EspeakProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EspeakProvider {
    /// Locate `espeak-ng` (or `espeak`) on PATH.
    pub fn new() -> Self {
        let binary = which::which("espeak-ng").or_else(|_| which::which("espeak")).ok();
        Self {
            binary,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }
}

#[async_trait]
impl SpeechProvider for EspeakProvider {
    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::Espeak
    }

    fn max_request_len(&self) -> usize {
        usize::MAX
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| ProviderError::unavailable(self.name(), "espeak-ng not found in PATH"))?;

        debug!(voice, chars = text.chars().count(), "Running espeak");
        let mut child = Command::new(binary)
            .args(["-v", voice, "--stdout", "--stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A process that exits early closes the pipe; its status tells the rest
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                debug!(error = %e, "espeak stdin closed early");
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProviderError::Timeout {
                service: self.name().to_string(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::unavailable(
                self.name(),
                format!("exit {:?}: {}", output.status.code(), stderr.trim()),
            ));
        }
        Ok(output.stdout)
    }
}
