//! Per-service call policies.
//!
//! Policies are set programmatically, deserialized, or read from
//! `RESILIENCE_<SERVICE>_<FIELD>` environment variables, e.g.
//! `RESILIENCE_PEXELS_TIMEOUT_MS=5000`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::backoff::{duration_ms, BackoffPolicy};
use crate::circuit_breaker::CircuitBreakerConfig;

/// Timeout, retry and breaker settings for one upstream service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePolicy {
    /// Per-attempt timeout
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    #[serde(with = "duration_ms")]
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub failure_threshold: u32,
    #[serde(with = "duration_ms")]
    pub reset_timeout: Duration,
}

impl Default for ServicePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

impl ServicePolicy {
    /// Read overrides for `service` from the environment on top of `base`.
    pub fn from_env(service: &str, base: &ServicePolicy) -> Self {
        Self::from_lookup(service, base, |key| std::env::var(key).ok())
    }

    /// Same as [`ServicePolicy::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(service: &str, base: &ServicePolicy, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = env_prefix(service);
        let get = |field: &str| lookup(&format!("{prefix}_{field}"));
        let millis = |field: &str, default: Duration| {
            get(field)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            timeout: millis("TIMEOUT_MS", base.timeout),
            max_retries: get("MAX_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(base.max_retries),
            initial_delay: millis("INITIAL_DELAY_MS", base.initial_delay),
            backoff_multiplier: get("BACKOFF_MULTIPLIER")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|m| m.is_finite() && *m >= 1.0)
                .unwrap_or(base.backoff_multiplier),
            failure_threshold: get("FAILURE_THRESHOLD")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|t| *t > 0)
                .unwrap_or(base.failure_threshold),
            reset_timeout: millis("RESET_TIMEOUT_MS", base.reset_timeout),
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.initial_delay, self.backoff_multiplier)
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: self.reset_timeout,
        }
    }

    /// Total attempts a call may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

fn env_prefix(service: &str) -> String {
    let key: String = service
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("RESILIENCE_{key}")
}

/// Default policy plus per-service overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySet {
    pub default: ServicePolicy,
    pub services: HashMap<String, ServicePolicy>,
}

impl PolicySet {
    pub fn new(default: ServicePolicy) -> Self {
        Self {
            default,
            services: HashMap::new(),
        }
    }

    /// Load `RESILIENCE_DEFAULT_*` and then per-service overrides for
    /// each of `services`.
    pub fn from_env(services: &[&str]) -> Self {
        let default = ServicePolicy::from_env("default", &ServicePolicy::default());
        let mut set = Self::new(default);
        for service in services {
            let policy = ServicePolicy::from_env(service, &set.default);
            if policy != set.default {
                set.services.insert((*service).to_string(), policy);
            }
        }
        set
    }

    pub fn with_policy(mut self, service: impl Into<String>, policy: ServicePolicy) -> Self {
        self.services.insert(service.into(), policy);
        self
    }

    pub fn for_service(&self, service: &str) -> &ServicePolicy {
        self.services.get(service).unwrap_or(&self.default)
    }
}
