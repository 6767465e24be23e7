//! Health probe results and audit records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthOutcome {
    /// The test ran and reported success
    Success,
    /// The test ran and reported failure
    Failure,
    /// The test itself errored
    Error,
}

impl HealthOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthOutcome::Success => "success",
            HealthOutcome::Failure => "failure",
            HealthOutcome::Error => "error",
        }
    }
}

impl fmt::Display for HealthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value returned by a registered health test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct TestResult {
    pub success: bool,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TestResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn with_fallback(mut self, service: impl Into<String>) -> Self {
        self.fallback_used = true;
        self.fallback_service = Some(service.into());
        self
    }
}

/// Audit row persisted for every executed probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceHealthRecord {
    pub service: String,
    pub result: HealthOutcome,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(default)]
    pub fallback_service: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ServiceHealthRecord {
    /// Build a record from a completed test.
    pub fn from_result(service: impl Into<String>, result: &TestResult) -> Self {
        Self {
            service: service.into(),
            result: if result.success {
                HealthOutcome::Success
            } else {
                HealthOutcome::Failure
            },
            response_time_ms: result.response_time_ms,
            fallback_used: result.fallback_used,
            fallback_service: result.fallback_service.clone(),
            error_message: result.error_message.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Build a record for a test that errored before producing a result.
    pub fn from_error(
        service: impl Into<String>,
        message: impl Into<String>,
        response_time_ms: Option<u64>,
    ) -> Self {
        Self {
            service: service.into(),
            result: HealthOutcome::Error,
            response_time_ms,
            fallback_used: false,
            fallback_service: None,
            error_message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == HealthOutcome::Success
    }
}

/// Classification used when reporting a service error to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorType {
    Timeout,
    Connection,
    Authentication,
    Availability,
    Other,
}

impl ServiceErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceErrorType::Timeout => "timeout",
            ServiceErrorType::Connection => "connection",
            ServiceErrorType::Authentication => "authentication",
            ServiceErrorType::Availability => "availability",
            ServiceErrorType::Other => "other",
        }
    }
}

impl fmt::Display for ServiceErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ServiceErrorType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "timeout" => ServiceErrorType::Timeout,
            "connection" => ServiceErrorType::Connection,
            "authentication" | "auth" => ServiceErrorType::Authentication,
            "availability" | "unavailable" => ServiceErrorType::Availability,
            _ => ServiceErrorType::Other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_result() {
        let result = TestResult::success()
            .with_response_time(120)
            .with_fallback("google_tts");
        let record = ServiceHealthRecord::from_result("elevenlabs", &result);

        assert_eq!(record.result, HealthOutcome::Success);
        assert_eq!(record.response_time_ms, Some(120));
        assert!(record.fallback_used);
        assert_eq!(record.fallback_service.as_deref(), Some("google_tts"));
    }

    #[test]
    fn test_record_roundtrip_json() {
        let record = ServiceHealthRecord::from_error("pexels", "boom", None);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""result":"error""#));

        let back: ServiceHealthRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_error_type_parse() {
        assert_eq!("auth".parse::<ServiceErrorType>().unwrap(), ServiceErrorType::Authentication);
        assert_eq!("weird".parse::<ServiceErrorType>().unwrap(), ServiceErrorType::Other);
    }
}
