//! Retrying client that routes outbound calls through per-service breakers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitSnapshot, Permit};
use crate::error::ResilienceError;
use crate::policy::{PolicySet, ServicePolicy};

/// Failure of a [`ResilientClient::call`].
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker refused the call (or a retry).
    #[error(transparent)]
    Rejected(ResilienceError),

    #[error("{service} timed out after {timeout_ms} ms ({attempts} attempt(s))")]
    Timeout {
        service: String,
        timeout_ms: u64,
        attempts: u32,
    },

    #[error("{service} failed after {attempts} attempt(s): {source}")]
    Failed {
        service: String,
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> CallError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::Rejected(e) if e.is_circuit_open())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout { .. })
    }

    /// The last upstream error, if the call got that far.
    pub fn upstream(&self) -> Option<&E> {
        match self {
            CallError::Failed { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            CallError::Rejected(_) => 0,
            CallError::Timeout { attempts, .. } | CallError::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Releases a half-open trial if the call future is dropped before reporting.
struct PermitGuard<'a> {
    breaker: &'a CircuitBreaker,
    permit: Permit,
    reported: bool,
}

impl PermitGuard<'_> {
    fn success(&mut self) {
        self.reported = true;
        self.breaker.on_success();
    }

    fn failure(&mut self) {
        self.reported = true;
        self.breaker.on_failure();
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        if !self.reported {
            self.breaker.release(&self.permit);
        }
    }
}

/// Outbound call wrapper: breaker admission, per-attempt timeout, retries
/// with exponential backoff. The breaker sees one outcome per call.
#[derive(Debug, Default)]
pub struct ResilientClient {
    policies: PolicySet,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl ResilientClient {
    pub fn new(policies: PolicySet) -> Self {
        Self {
            policies,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self, service: &str) -> &ServicePolicy {
        self.policies.for_service(service)
    }

    /// Breaker for `service`, created on first use.
    pub fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    service,
                    self.policy(service).breaker_config(),
                ))
            })
            .clone()
    }

    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut snapshots: Vec<_> = breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }

    /// Run `op` under the service's policy, retrying every error.
    pub async fn call<T, E, F, Fut>(&self, service: &str, op: F) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.call_if(service, op, |_| true).await
    }

    /// Run `op`, retrying only errors for which `should_retry` returns true.
    pub async fn call_if<T, E, F, Fut, R>(
        &self,
        service: &str,
        mut op: F,
        should_retry: R,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let breaker = self.breaker(service);
        let policy = self.policy(service).clone();
        let backoff = policy.backoff();
        let max_attempts = policy.max_attempts();

        let permit = match breaker.acquire() {
            Ok(permit) => permit,
            Err(e) => {
                metrics::counter!("reelgen_upstream_rejected_total", "service" => service.to_string())
                    .increment(1);
                return Err(CallError::Rejected(e));
            }
        };
        let mut guard = PermitGuard {
            breaker: &breaker,
            permit,
            reported: false,
        };

        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                // Another caller may have opened the circuit meanwhile; the
                // outcome was already reported by whoever opened it.
                if let Err(e) = breaker.recheck(&permit) {
                    return Err(CallError::Rejected(e));
                }
            }
            attempt += 1;

            match tokio::time::timeout(policy.timeout, op()).await {
                Ok(Ok(value)) => {
                    guard.success();
                    metrics::counter!(
                        "reelgen_upstream_calls_total",
                        "service" => service.to_string(),
                        "outcome" => "success"
                    )
                    .increment(1);
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    if attempt >= max_attempts || !should_retry(&e) {
                        warn!(service, attempts = attempt, error = %e, "Upstream call failed");
                        guard.failure();
                        record_failure(service);
                        return Err(CallError::Failed {
                            service: service.to_string(),
                            attempts: attempt,
                            source: e,
                        });
                    }
                    debug!(service, attempt, error = %e, "Attempt failed, will retry");
                }
                Err(_) => {
                    if attempt >= max_attempts {
                        warn!(
                            service,
                            attempts = attempt,
                            timeout_ms = policy.timeout.as_millis() as u64,
                            "Upstream call timed out"
                        );
                        guard.failure();
                        record_failure(service);
                        return Err(CallError::Timeout {
                            service: service.to_string(),
                            timeout_ms: policy.timeout.as_millis() as u64,
                            attempts: attempt,
                        });
                    }
                    debug!(service, attempt, "Attempt timed out, will retry");
                }
            }

            tokio::time::sleep(backoff.delay_for_attempt(attempt - 1)).await;
        }
    }
}

fn record_failure(service: &str) {
    metrics::counter!(
        "reelgen_upstream_calls_total",
        "service" => service.to_string(),
        "outcome" => "failure"
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn client(max_retries: u32, failure_threshold: u32) -> ResilientClient {
        ResilientClient::new(PolicySet::new(ServicePolicy {
            timeout: Duration::from_secs(1),
            max_retries,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            failure_threshold,
            reset_timeout: Duration::from_secs(10),
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let client = client(3, 5);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<u32, CallError<String>> = client
            .call("pexels", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(format!("boom {n}"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(client.breaker("pexels").failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_one_failure_per_call() {
        let client = client(2, 5);

        let result: Result<(), CallError<String>> = client
            .call("pixabay", || async { Err("down".to_string()) })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.upstream().map(String::as_str), Some("down"));
        assert_eq!(client.breaker("pixabay").failure_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let client = client(3, 5);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), CallError<String>> = client
            .call_if(
                "elevenlabs",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("401".to_string())
                },
                |e| e != "401",
            )
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_per_attempt() {
        let client = client(1, 5);

        let result: Result<(), CallError<String>> = client
            .call("openai_tts", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_rejects_without_calling() {
        let client = client(0, 2);
        for _ in 0..2 {
            let _: Result<(), CallError<String>> =
                client.call("pexels", || async { Err("x".into()) }).await;
        }
        assert_eq!(client.breaker("pexels").state(), CircuitState::Open);

        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), CallError<String>> = client
            .call("pexels", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_circuit_open());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
