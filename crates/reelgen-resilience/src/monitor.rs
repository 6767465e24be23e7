//! Resilience monitor.
//!
//! Owns the registry of health tests, runs them on a timer, persists every
//! outcome, tracks which services are degraded and schedules recovery probes
//! for them.

use reelgen_models::{ServiceErrorType, ServiceHealthRecord, TestResult};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::degraded::{DegradedServiceSet, DegradedSignal};
use crate::error::ResilienceError;
use crate::health_test::HealthTest;
use crate::stats::StatisticsReport;
use crate::store::HealthRecordStore;

/// Monitor tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Period of the scheduled `run_all_tests`
    pub test_interval: Duration,
    /// Global error ceiling; also scales the recovery probe budget
    pub max_recovery_attempts: u32,
    /// Delay before the first recovery probe
    pub recovery_base_delay: Duration,
    /// Cap for the doubling recovery delay
    pub recovery_max_interval: Duration,
    /// Recovery probes allowed = `max_recovery_attempts * extended_recovery_factor`
    pub extended_recovery_factor: u32,
    /// Upper bound for a single health test
    pub test_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            test_interval: Duration::from_secs(6 * 60 * 60),
            max_recovery_attempts: 5,
            recovery_base_delay: Duration::from_secs(5 * 60),
            recovery_max_interval: Duration::from_secs(60 * 60),
            extended_recovery_factor: 2,
            test_timeout: Duration::from_secs(120),
        }
    }
}

impl MonitorConfig {
    /// Load from environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            test_interval: secs("MONITOR_TEST_INTERVAL_SECS", defaults.test_interval),
            max_recovery_attempts: std::env::var("MONITOR_MAX_RECOVERY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_recovery_attempts),
            recovery_base_delay: secs("MONITOR_RECOVERY_BASE_DELAY_SECS", defaults.recovery_base_delay),
            recovery_max_interval: secs(
                "MONITOR_RECOVERY_MAX_INTERVAL_SECS",
                defaults.recovery_max_interval,
            ),
            extended_recovery_factor: std::env::var("MONITOR_EXTENDED_RECOVERY_FACTOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.extended_recovery_factor),
            test_timeout: secs("MONITOR_TEST_TIMEOUT_SECS", defaults.test_timeout),
        }
    }

    /// Total recovery probes before giving up.
    pub fn recovery_probe_budget(&self) -> u32 {
        self.max_recovery_attempts
            .saturating_mul(self.extended_recovery_factor)
    }

    fn recovery_backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.recovery_base_delay, 2.0).with_max_delay(self.recovery_max_interval)
    }
}

#[derive(Debug, Clone, Copy)]
struct ErrorStreak {
    error_type: ServiceErrorType,
    count: u32,
}

struct Inner {
    config: MonitorConfig,
    store: Arc<dyn HealthRecordStore>,
    tests: RwLock<BTreeMap<String, Arc<dyn HealthTest>>>,
    degraded: Mutex<DegradedServiceSet>,
    streaks: Mutex<HashMap<String, ErrorStreak>>,
    recovery_tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Services whose probe budget ran out; no probes until marked recovered
    exhausted: Mutex<HashSet<String>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolves once shutdown is requested. The borrow guard is dropped inside,
/// so callers stay `Send` across other `select!` arms.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Health monitor and degraded-mode controller. Cheap to clone.
#[derive(Clone)]
pub struct ResilienceMonitor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ResilienceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceMonitor")
            .field("config", &self.inner.config)
            .field("tests", &self.registered_tests())
            .field("degraded", &self.degraded_services())
            .finish()
    }
}

impl ResilienceMonitor {
    pub fn new(config: MonitorConfig, store: Arc<dyn HealthRecordStore>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                tests: RwLock::new(BTreeMap::new()),
                degraded: Mutex::new(DegradedServiceSet::new()),
                streaks: Mutex::new(HashMap::new()),
                recovery_tasks: Mutex::new(HashMap::new()),
                exhausted: Mutex::new(HashSet::new()),
                timer: Mutex::new(None),
                shutdown,
            }),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    // ========================================================================
    // Test registry
    // ========================================================================

    /// Register (or replace) the health test for `service`.
    pub fn register_test(&self, service: impl Into<String>, test: Arc<dyn HealthTest>) {
        let service = service.into();
        debug!(service = %service, "Registered health test");
        self.inner
            .tests
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(service, test);
    }

    pub fn unregister_test(&self, service: &str) -> bool {
        self.inner
            .tests
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(service)
            .is_some()
    }

    /// Registered services in name order.
    pub fn registered_tests(&self) -> Vec<String> {
        self.inner
            .tests
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    fn test_for(&self, service: &str) -> Option<Arc<dyn HealthTest>> {
        self.inner
            .tests
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(service)
            .cloned()
    }

    // ========================================================================
    // Test execution
    // ========================================================================

    /// Run one registered test, persist its record and return the result.
    ///
    /// Unregistered services yield a failure result and persist nothing.
    pub async fn run_test(&self, service: &str, options: Option<&Value>) -> TestResult {
        let Some(test) = self.test_for(service) else {
            warn!(service, "No health test registered");
            return TestResult::failure(format!("No health test registered for {service}"));
        };

        let options = options.cloned();
        let started = Instant::now();
        let mut handle = tokio::spawn(async move { test.run(options.as_ref()).await });
        let outcome = tokio::time::timeout(self.inner.config.test_timeout, &mut handle).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (result, record) = match outcome {
            Ok(Ok(Ok(mut result))) => {
                if result.response_time_ms.is_none() {
                    result.response_time_ms = Some(elapsed_ms);
                }
                let record = ServiceHealthRecord::from_result(service, &result);
                (result, record)
            }
            Ok(Ok(Err(e))) => Self::errored(service, e.to_string(), elapsed_ms),
            Ok(Err(join_error)) => {
                Self::errored(service, format!("Health test aborted: {join_error}"), elapsed_ms)
            }
            Err(_) => {
                handle.abort();
                let message = ResilienceError::TestTimeout {
                    service: service.to_string(),
                    timeout_ms: self.inner.config.test_timeout.as_millis() as u64,
                }
                .to_string();
                Self::errored(service, message, elapsed_ms)
            }
        };

        if result.success {
            debug!(service, response_time_ms = elapsed_ms, "Health test passed");
        } else {
            warn!(
                service,
                response_time_ms = elapsed_ms,
                error = result.error_message.as_deref().unwrap_or(""),
                "Health test failed"
            );
        }
        metrics::counter!(
            "reelgen_health_tests_total",
            "service" => service.to_string(),
            "result" => record.result.as_str()
        )
        .increment(1);

        if let Err(e) = self.inner.store.append(&record).await {
            error!(service, error = %e, "Failed to persist health record");
        }

        result
    }

    fn errored(service: &str, message: String, elapsed_ms: u64) -> (TestResult, ServiceHealthRecord) {
        let record = ServiceHealthRecord::from_error(service, message.clone(), Some(elapsed_ms));
        (TestResult::failure(message).with_response_time(elapsed_ms), record)
    }

    /// Run every registered test sequentially, in name order.
    pub async fn run_all_tests(&self) -> BTreeMap<String, TestResult> {
        let services = self.registered_tests();
        info!(count = services.len(), "Running all health tests");

        let mut results = BTreeMap::new();
        for service in services {
            let result = self.run_test(&service, None).await;
            results.insert(service, result);
        }
        results
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Run all tests now and then every `interval` until [`shutdown`](Self::shutdown).
    pub fn start(&self, interval: Duration) {
        self.inner.shutdown.send_if_modified(|stop| std::mem::replace(stop, false));
        let monitor = self.clone();
        let mut shutdown_rx = self.inner.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stopped(&mut shutdown_rx) => {
                        info!("Health monitor timer shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        monitor.run_all_tests().await;
                    }
                }
            }
        });

        if let Some(previous) = lock(&self.inner.timer).replace(handle) {
            previous.abort();
        }
        info!(interval_secs = interval.as_secs(), "Health monitor started");
    }

    /// Stop the timer and every pending recovery task.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        if let Some(timer) = lock(&self.inner.timer).take() {
            timer.abort();
        }
        for (_, task) in lock(&self.inner.recovery_tasks).drain() {
            task.abort();
        }
        info!("Health monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.timer)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // ========================================================================
    // Degraded mode
    // ========================================================================

    /// Record an error observed by a caller of `service`.
    ///
    /// Returns true when the service is in degraded mode after this error.
    pub fn handle_service_error(
        &self,
        service: &str,
        message: &str,
        error_type: ServiceErrorType,
    ) -> bool {
        let streak = {
            let mut streaks = lock(&self.inner.streaks);
            let entry = streaks.entry(service.to_string()).or_insert(ErrorStreak {
                error_type,
                count: 0,
            });
            if entry.error_type == error_type {
                entry.count = entry.count.saturating_add(1);
            } else {
                *entry = ErrorStreak {
                    error_type,
                    count: 1,
                };
            }
            entry.count
        };

        let (attempts, newly_degraded, first_degraded) = {
            let mut degraded = lock(&self.inner.degraded);
            let attempts = degraded.bump_attempts(service);

            let threshold_met = match error_type {
                ServiceErrorType::Timeout => streak >= 2,
                ServiceErrorType::Connection => streak >= 1,
                ServiceErrorType::Authentication => streak >= 2,
                ServiceErrorType::Availability => streak >= 1,
                ServiceErrorType::Other => false,
            } || attempts > self.inner.config.max_recovery_attempts;

            if !threshold_met {
                debug!(
                    service,
                    error_type = %error_type,
                    streak,
                    attempts,
                    error = message,
                    "Service error recorded"
                );
                return false;
            }

            let was_healthy = !degraded.is_system_degraded();
            let added = degraded.insert(service);
            (attempts, added, added && was_healthy)
        };

        if newly_degraded {
            warn!(
                service,
                error_type = %error_type,
                attempts,
                error = message,
                "Service entered degraded mode"
            );
            if first_degraded {
                warn!("System entered degraded mode");
            }
            metrics::counter!("reelgen_degraded_activations_total", "service" => service.to_string())
                .increment(1);
        }
        self.schedule_recovery(service);
        true
    }

    fn schedule_recovery(&self, service: &str) {
        let mut tasks = lock(&self.inner.recovery_tasks);
        if tasks.get(service).is_some_and(|task| !task.is_finished()) {
            return;
        }
        if *self.inner.shutdown.borrow() {
            debug!(service, "Monitor shut down, not scheduling recovery");
            return;
        }
        if lock(&self.inner.exhausted).contains(service) {
            debug!(service, "Recovery attempts exhausted, waiting for manual recovery");
            return;
        }

        let monitor = self.clone();
        let name = service.to_string();
        let handle = tokio::spawn(async move { monitor.recovery_loop(name).await });
        tasks.insert(service.to_string(), handle);
    }

    async fn recovery_loop(self, service: String) {
        let config = &self.inner.config;
        let backoff = config.recovery_backoff();
        let budget = config.recovery_probe_budget();
        let mut shutdown_rx = self.inner.shutdown.subscribe();

        for attempt in 0..budget {
            let delay = backoff.delay_for_attempt(attempt);
            debug!(service = %service, attempt = attempt + 1, delay_secs = delay.as_secs(), "Recovery probe scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(&mut shutdown_rx) => return,
            }

            if !self.is_degraded(&service) {
                return;
            }

            let result = self.run_test(&service, None).await;
            if result.success {
                self.mark_recovered(&service);
                return;
            }
        }

        lock(&self.inner.exhausted).insert(service.clone());
        warn!(service = %service, probes = budget, "Recovery attempts exhausted, service stays degraded");
    }

    /// True once automatic probing gave up on `service`.
    pub fn is_recovery_exhausted(&self, service: &str) -> bool {
        lock(&self.inner.exhausted).contains(service)
    }

    /// Clear degraded state and counters for `service`. This is also the
    /// manual reset once automatic recovery is exhausted.
    pub fn mark_recovered(&self, service: &str) {
        lock(&self.inner.streaks).remove(service);
        lock(&self.inner.exhausted).remove(service);
        let (removed, system_clear) = {
            let mut degraded = lock(&self.inner.degraded);
            let removed = degraded.remove(service);
            (removed, !degraded.is_system_degraded())
        };
        if removed {
            info!(service, "Service recovered");
            if system_clear {
                info!("System left degraded mode");
            }
        }
    }

    pub fn is_degraded(&self, service: &str) -> bool {
        lock(&self.inner.degraded).contains(service)
    }

    pub fn is_system_degraded(&self) -> bool {
        lock(&self.inner.degraded).is_system_degraded()
    }

    pub fn degraded_services(&self) -> Vec<String> {
        lock(&self.inner.degraded).services()
    }

    /// Errors counted against `service` since it last recovered.
    pub fn error_attempts(&self, service: &str) -> u32 {
        lock(&self.inner.degraded).attempts(service)
    }

    /// Read-only handle for callers that route around degraded services.
    pub fn signal(&self) -> DegradedSignal {
        lock(&self.inner.degraded).signal()
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    /// Statistics over the full record history. Storage errors yield an
    /// empty history.
    pub async fn statistics(&self) -> StatisticsReport {
        let records = match self.inner.store.records(None).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Failed to load health records");
                Vec::new()
            }
        };
        StatisticsReport::from_records(&records, self.degraded_services())
    }

    pub async fn service_history(&self, service: &str) -> Vec<ServiceHealthRecord> {
        self.inner
            .store
            .records(Some(service))
            .await
            .unwrap_or_else(|e| {
                error!(service, error = %e, "Failed to load health records");
                Vec::new()
            })
    }
}
