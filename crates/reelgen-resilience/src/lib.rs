//! Resilience layer for outbound calls and external dependencies.
//!
//! - [`ResilientClient`]: per-service circuit breakers, timeouts and retries
//! - [`ResilienceMonitor`]: health tests, degraded-mode tracking, recovery
//! - [`StatisticsReport`]: aggregates over the persisted health history
//! - [`soak`]: repeat a health test until it holds a success streak

pub mod backoff;
pub mod circuit_breaker;
pub mod client;
pub mod degraded;
pub mod error;
pub mod monitor;
pub mod policy;
pub mod soak;
pub mod stats;
pub mod store;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState, Permit};
pub use client::{CallError, ResilientClient};
pub use degraded::{DegradedServiceSet, DegradedSignal};
pub use error::{ResilienceError, ResilienceResult};
pub use health_test::{health_test_fn, HealthTest};
pub use monitor::{MonitorConfig, ResilienceMonitor};
pub use policy::{PolicySet, ServicePolicy};
pub use soak::{soak, SoakConfig, SoakReport};
pub use stats::{ErrorCount, ServiceRanking, ServiceStatistics, StatisticsReport};
pub use store::{HealthRecordStore, InMemoryHealthStore, JsonLinesHealthStore};
