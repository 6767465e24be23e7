//! Circuit breaker for external service calls.
//!
//! ```text
//!   CLOSED --(failures >= threshold)--> OPEN
//!   OPEN   --(now >= next_attempt)----> HALF_OPEN (one trial call)
//!   HALF_OPEN --(trial ok)------------> CLOSED
//!   HALF_OPEN --(trial failed)--------> OPEN (fresh next_attempt)
//! ```
//!
//! Timing uses `tokio::time::Instant` so tests can drive the clock with a
//! paused runtime.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backoff::duration_ms;
use crate::error::{ResilienceError, ResilienceResult};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing fast until `next_attempt`
    Open,
    /// One trial call admitted
    HalfOpen,
}

/// Breaker tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Cooldown between opening and the next trial call
    #[serde(with = "duration_ms")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Admission ticket returned by [`CircuitBreaker::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    /// This call is the single half-open trial.
    pub trial: bool,
}

/// Point-in-time view of a breaker, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub service: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// Milliseconds until the next trial is admitted (open circuits only)
    pub retry_in_ms: Option<u64>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    next_attempt: Option<Instant>,
    trial_in_flight: bool,
}

/// Per-upstream circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                next_attempt: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask to make a call. Rejects with `CircuitOpen` while the circuit is
    /// open, or while another caller holds the half-open trial.
    pub fn acquire(&self) -> ResilienceResult<Permit> {
        let mut state = self.lock();
        let now = Instant::now();

        match state.state {
            CircuitState::Closed => Ok(Permit { trial: false }),
            CircuitState::Open => match state.next_attempt {
                Some(next) if now < next => Err(self.rejection(next, now)),
                _ => {
                    info!(service = %self.service, "Circuit half-open, admitting trial call");
                    state.state = CircuitState::HalfOpen;
                    state.trial_in_flight = true;
                    Ok(Permit { trial: true })
                }
            },
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    Err(ResilienceError::CircuitOpen {
                        service: self.service.clone(),
                        retry_in_ms: 0,
                    })
                } else {
                    state.trial_in_flight = true;
                    Ok(Permit { trial: true })
                }
            }
        }
    }

    /// Re-check admission for a retry within a call that already holds `permit`.
    pub fn recheck(&self, permit: &Permit) -> ResilienceResult<()> {
        let state = self.lock();
        let now = Instant::now();

        match state.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen if permit.trial => Ok(()),
            CircuitState::HalfOpen => Err(ResilienceError::CircuitOpen {
                service: self.service.clone(),
                retry_in_ms: 0,
            }),
            CircuitState::Open => match state.next_attempt {
                Some(next) if now < next => Err(self.rejection(next, now)),
                _ => Ok(()),
            },
        }
    }

    fn rejection(&self, next: Instant, now: Instant) -> ResilienceError {
        ResilienceError::CircuitOpen {
            service: self.service.clone(),
            retry_in_ms: next.saturating_duration_since(now).as_millis() as u64,
        }
    }

    /// Record a successful call.
    pub fn on_success(&self) {
        let mut state = self.lock();
        if state.state != CircuitState::Closed {
            info!(service = %self.service, "Circuit closed after successful trial");
        }
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.next_attempt = None;
        state.trial_in_flight = false;
    }

    /// Record a failed call.
    pub fn on_failure(&self) {
        let mut state = self.lock();
        let now = Instant::now();
        state.failure_count = state.failure_count.saturating_add(1);

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    warn!(
                        service = %self.service,
                        failures = state.failure_count,
                        "Circuit opened"
                    );
                    state.state = CircuitState::Open;
                    state.next_attempt = Some(now + self.config.reset_timeout);
                } else {
                    debug!(
                        service = %self.service,
                        failures = state.failure_count,
                        threshold = self.config.failure_threshold,
                        "Recorded failure"
                    );
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                warn!(service = %self.service, "Trial call failed, circuit re-opened");
                state.state = CircuitState::Open;
                state.next_attempt = Some(now + self.config.reset_timeout);
                state.trial_in_flight = false;
            }
        }
    }

    /// Current state. An open circuit past its cooldown still reports `Open`
    /// until the next call is admitted.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn next_attempt(&self) -> Option<Instant> {
        let state = self.lock();
        match state.state {
            CircuitState::Open => state.next_attempt,
            _ => None,
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.lock();
        let retry_in_ms = match (state.state, state.next_attempt) {
            (CircuitState::Open, Some(next)) => Some(
                next.saturating_duration_since(Instant::now()).as_millis() as u64,
            ),
            _ => None,
        };
        CircuitSnapshot {
            service: self.service.clone(),
            state: state.state,
            failure_count: state.failure_count,
            retry_in_ms,
        }
    }

    /// Give back a trial permit whose call never reported an outcome.
    pub fn release(&self, permit: &Permit) {
        if !permit.trial {
            return;
        }
        let mut state = self.lock();
        if state.state == CircuitState::HalfOpen {
            state.trial_in_flight = false;
        }
    }

    /// Force the breaker back to closed.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.next_attempt = None;
        state.trial_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "pexels",
            CircuitBreakerConfig {
                failure_threshold: 3,
                reset_timeout: Duration::from_secs(30),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let cb = breaker();
        for _ in 0..2 {
            cb.acquire().unwrap();
            cb.on_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.acquire().unwrap();
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.acquire().unwrap_err().is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let cb = breaker();
        cb.on_failure();
        cb.on_failure();
        cb.on_success();
        assert_eq!(cb.failure_count(), 0);

        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_trial() {
        let cb = breaker();
        for _ in 0..3 {
            cb.on_failure();
        }

        tokio::time::advance(Duration::from_secs(30)).await;

        let permit = cb.acquire().unwrap();
        assert!(permit.trial);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.acquire().is_err(), "second caller must be rejected");
        assert!(cb.recheck(&permit).is_ok(), "trial holder may retry");

        cb.on_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens_with_new_deadline() {
        let cb = breaker();
        for _ in 0..3 {
            cb.on_failure();
        }
        let first_deadline = cb.next_attempt().unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        cb.acquire().unwrap();
        cb.on_failure();

        assert_eq!(cb.state(), CircuitState::Open);
        let second_deadline = cb.next_attempt().unwrap();
        assert!(second_deadline > first_deadline);
        tokio_test::assert_err!(cb.acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reports_retry_window() {
        let cb = breaker();
        for _ in 0..3 {
            cb.on_failure();
        }
        tokio::time::advance(Duration::from_secs(10)).await;

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.retry_in_ms, Some(20_000));
    }
}
