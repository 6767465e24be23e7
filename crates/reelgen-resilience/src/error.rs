//! Error types for resilience operations.

use thiserror::Error;

/// Result type for resilience operations.
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors surfaced by breakers, the monitor and health-record storage.
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Breaker rejected the call before any attempt was made.
    #[error("Circuit open for {service}; next attempt in {retry_in_ms} ms")]
    CircuitOpen { service: String, retry_in_ms: u64 },

    #[error("Health test for {service} timed out after {timeout_ms} ms")]
    TestTimeout { service: String, timeout_ms: u64 },

    #[error("Health store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResilienceError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::TestTimeout { .. })
    }
}
