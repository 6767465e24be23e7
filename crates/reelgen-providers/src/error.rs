//! Provider and chain errors.

use reelgen_media::MediaError;
use reelgen_models::ServiceErrorType;
use reelgen_resilience::{CallError, ResilienceError};
use thiserror::Error;

/// Result type for a single provider call.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type for a fallback chain.
pub type ChainResult<T> = Result<T, ChainError>;

/// Failure of one provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{service} is not configured: {reason}")]
    NotConfigured { service: String, reason: String },

    #[error("{service} request timed out")]
    Timeout { service: String },

    #[error("{service} connection failed: {message}")]
    Connection { service: String, message: String },

    #[error("{service} rejected credentials (HTTP {status})")]
    Authentication { service: String, status: u16 },

    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    #[error("{service} request failed (HTTP {status}): {message}")]
    Http {
        service: String,
        status: u16,
        message: String,
    },

    #[error("{service} returned an invalid response: {message}")]
    InvalidResponse { service: String, message: String },

    #[error("{service} returned empty audio")]
    EmptyAudio { service: String },

    #[error("{service} circuit open; retry in {retry_in_ms} ms")]
    CircuitOpen { service: String, retry_in_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn not_configured(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotConfigured {
            service: service.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_response(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Map an HTTP error status.
    pub fn from_status(service: &str, status: u16, body: &str) -> Self {
        let message: String = body.chars().take(200).collect();
        match status {
            401 | 403 => Self::Authentication {
                service: service.to_string(),
                status,
            },
            429 | 500..=599 => Self::Unavailable {
                service: service.to_string(),
                message: format!("HTTP {status}: {message}"),
            },
            _ => Self::Http {
                service: service.to_string(),
                status,
                message,
            },
        }
    }

    /// Map a transport error.
    pub fn from_reqwest(service: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                service: service.to_string(),
            }
        } else if err.is_decode() {
            Self::invalid_response(service, err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(service, status.as_u16(), &err.to_string())
        } else {
            Self::Connection {
                service: service.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Unwrap a breaker-client failure into the provider error it carries.
    pub fn from_call(service: &str, err: CallError<ProviderError>) -> Self {
        match err {
            CallError::Rejected(ResilienceError::CircuitOpen { service, retry_in_ms }) => {
                Self::CircuitOpen { service, retry_in_ms }
            }
            CallError::Rejected(other) => Self::unavailable(service, other.to_string()),
            CallError::Timeout { service, .. } => Self::Timeout { service },
            CallError::Failed { source, .. } => source,
        }
    }

    /// Classification reported to the resilience monitor.
    pub fn error_type(&self) -> ServiceErrorType {
        match self {
            Self::Timeout { .. } => ServiceErrorType::Timeout,
            Self::Connection { .. } => ServiceErrorType::Connection,
            Self::Authentication { .. } => ServiceErrorType::Authentication,
            Self::Unavailable { .. } | Self::CircuitOpen { .. } => ServiceErrorType::Availability,
            _ => ServiceErrorType::Other,
        }
    }

    /// Worth another attempt inside the breaker client.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connection { .. } | Self::Unavailable { .. }
        )
    }
}

/// Failure of a whole fallback chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("All providers exhausted: {}", format_errors(.0))]
    AllProvidersExhausted(Vec<(String, String)>),

    #[error("Nothing to synthesize")]
    EmptyText,

    #[error("Placeholder generation failed: {0}")]
    Placeholder(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChainError {
    /// `(provider, message)` pairs collected before giving up.
    pub fn provider_errors(&self) -> &[(String, String)] {
        match self {
            Self::AllProvidersExhausted(errors) => errors,
            _ => &[],
        }
    }
}

fn format_errors(errors: &[(String, String)]) -> String {
    if errors.is_empty() {
        return "no providers configured".to_string();
    }
    errors
        .iter()
        .map(|(provider, message)| format!("{provider}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}
