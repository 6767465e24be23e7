//! Soak runs: repeat one health test until it passes a streak in a row.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::backoff::duration_ms;
use crate::monitor::ResilienceMonitor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoakConfig {
    /// Consecutive successes needed to pass
    pub required_successes: u32,
    /// Consecutive failures that abort the run
    pub max_consecutive_failures: u32,
    /// Pause between attempts
    #[serde(with = "duration_ms")]
    pub pause: Duration,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            required_successes: 10,
            max_consecutive_failures: 100,
            pause: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoakReport {
    pub service: String,
    pub passed: bool,
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    pub longest_streak: u32,
    /// Error message -> occurrences
    pub errors: BTreeMap<String, u32>,
    pub duration_ms: u64,
}

impl SoakReport {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 * 100.0 / self.attempts as f64
        }
    }
}

/// Run `service`'s registered test through the monitor until
/// `required_successes` pass in a row or `max_consecutive_failures` fail in a
/// row. Every attempt is persisted like any other probe.
pub async fn soak(
    monitor: &ResilienceMonitor,
    service: &str,
    options: Option<&Value>,
    config: &SoakConfig,
) -> SoakReport {
    let started = Instant::now();
    let mut report = SoakReport {
        service: service.to_string(),
        passed: false,
        attempts: 0,
        successes: 0,
        failures: 0,
        longest_streak: 0,
        errors: BTreeMap::new(),
        duration_ms: 0,
    };

    info!(
        service,
        required = config.required_successes,
        "Starting soak run"
    );

    let mut streak = 0u32;
    let mut failure_streak = 0u32;
    while streak < config.required_successes {
        if report.attempts > 0 && !config.pause.is_zero() {
            tokio::time::sleep(config.pause).await;
        }

        let result = monitor.run_test(service, options).await;
        report.attempts += 1;

        if result.success {
            report.successes += 1;
            streak += 1;
            failure_streak = 0;
            report.longest_streak = report.longest_streak.max(streak);
        } else {
            report.failures += 1;
            streak = 0;
            failure_streak += 1;
            let message = result
                .error_message
                .unwrap_or_else(|| "unknown error".to_string());
            *report.errors.entry(message).or_insert(0) += 1;

            if failure_streak >= config.max_consecutive_failures {
                warn!(service, failures = failure_streak, "Soak run aborted");
                break;
            }
        }
    }

    report.passed = streak >= config.required_successes;
    report.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        service,
        passed = report.passed,
        attempts = report.attempts,
        success_rate = report.success_rate(),
        "Soak run finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health_test::health_test_fn;
    use crate::monitor::MonitorConfig;
    use crate::store::InMemoryHealthStore;
    use reelgen_models::TestResult;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config(required: u32, max_failures: u32) -> SoakConfig {
        SoakConfig {
            required_successes: required,
            max_consecutive_failures: max_failures,
            pause: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_failure_resets_streak() {
        let store = Arc::new(InMemoryHealthStore::new());
        let monitor = ResilienceMonitor::new(MonitorConfig::default(), store.clone());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        // pass, pass, fail, then pass forever
        monitor.register_test(
            "flaky",
            health_test_fn(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(if n == 2 {
                        TestResult::failure("hiccup")
                    } else {
                        TestResult::success()
                    })
                }
            }),
        );

        let report = soak(&monitor, "flaky", None, &config(3, 10)).await;

        assert!(report.passed);
        assert_eq!(report.attempts, 6);
        assert_eq!(report.failures, 1);
        assert_eq!(report.errors.get("hiccup"), Some(&1));
        assert_eq!(store.len().await, 6);
    }

    #[tokio::test]
    async fn test_aborts_after_consecutive_failures() {
        let store = Arc::new(InMemoryHealthStore::new());
        let monitor = ResilienceMonitor::new(MonitorConfig::default(), store);
        monitor.register_test(
            "down",
            health_test_fn(|_| async { Ok(TestResult::failure("503")) }),
        );

        let report = soak(&monitor, "down", None, &config(2, 4)).await;

        assert!(!report.passed);
        assert_eq!(report.attempts, 4);
        assert_eq!(report.errors.get("503"), Some(&4));
        assert_eq!(report.success_rate(), 0.0);
    }
}
