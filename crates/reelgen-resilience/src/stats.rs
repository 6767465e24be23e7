//! Aggregated statistics over the health record history.

use chrono::{DateTime, Utc};
use reelgen_models::{HealthOutcome, ServiceHealthRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::ResilienceResult;

const TOP_ERRORS: usize = 5;
const RANKING_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCount {
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatistics {
    pub service: String,
    pub total_tests: usize,
    pub successes: usize,
    pub failures: usize,
    pub errors: usize,
    /// Percentage, 0-100
    pub success_rate: f64,
    /// Mean over successful probes that reported a response time
    pub average_response_time_ms: Option<f64>,
    /// Percentage, 0-100
    pub fallback_rate: f64,
    pub top_errors: Vec<ErrorCount>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRanking {
    pub service: String,
    pub value: f64,
}

/// System-wide report built from every persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub generated_at: DateTime<Utc>,
    pub total_tests: usize,
    pub overall_success_rate: f64,
    pub services: BTreeMap<String, ServiceStatistics>,
    /// Lowest success rate first
    pub least_reliable: Vec<ServiceRanking>,
    /// Highest average response time first
    pub slowest: Vec<ServiceRanking>,
    pub degraded_services: Vec<String>,
    pub system_degraded: bool,
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

impl ServiceStatistics {
    fn from_records(service: &str, records: &[&ServiceHealthRecord]) -> Self {
        let total = records.len();
        let successes = records.iter().filter(|r| r.result == HealthOutcome::Success).count();
        let failures = records.iter().filter(|r| r.result == HealthOutcome::Failure).count();
        let errors = records.iter().filter(|r| r.result == HealthOutcome::Error).count();
        let fallbacks = records.iter().filter(|r| r.fallback_used).count();

        let timings: Vec<u64> = records
            .iter()
            .filter(|r| r.is_success())
            .filter_map(|r| r.response_time_ms)
            .collect();
        let average_response_time_ms = if timings.is_empty() {
            None
        } else {
            Some(timings.iter().sum::<u64>() as f64 / timings.len() as f64)
        };

        let mut histogram: HashMap<&str, usize> = HashMap::new();
        for message in records.iter().filter_map(|r| r.error_message.as_deref()) {
            *histogram.entry(message).or_insert(0) += 1;
        }
        let mut top_errors: Vec<ErrorCount> = histogram
            .into_iter()
            .map(|(message, count)| ErrorCount {
                message: message.to_string(),
                count,
            })
            .collect();
        top_errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        top_errors.truncate(TOP_ERRORS);

        Self {
            service: service.to_string(),
            total_tests: total,
            successes,
            failures,
            errors,
            success_rate: percent(successes, total),
            average_response_time_ms,
            fallback_rate: percent(fallbacks, total),
            top_errors,
            last_checked: records.iter().map(|r| r.timestamp).max(),
        }
    }
}

impl StatisticsReport {
    pub fn from_records(records: &[ServiceHealthRecord], degraded_services: Vec<String>) -> Self {
        let mut grouped: BTreeMap<&str, Vec<&ServiceHealthRecord>> = BTreeMap::new();
        for record in records {
            grouped.entry(record.service.as_str()).or_default().push(record);
        }

        let services: BTreeMap<String, ServiceStatistics> = grouped
            .iter()
            .map(|(service, rows)| {
                (
                    service.to_string(),
                    ServiceStatistics::from_records(service, rows),
                )
            })
            .collect();

        let total_successes = records.iter().filter(|r| r.is_success()).count();

        let mut least_reliable: Vec<ServiceRanking> = services
            .values()
            .map(|s| ServiceRanking {
                service: s.service.clone(),
                value: s.success_rate,
            })
            .collect();
        least_reliable.sort_by(|a, b| a.value.total_cmp(&b.value).then_with(|| a.service.cmp(&b.service)));
        least_reliable.truncate(RANKING_SIZE);

        let mut slowest: Vec<ServiceRanking> = services
            .values()
            .filter_map(|s| {
                s.average_response_time_ms.map(|value| ServiceRanking {
                    service: s.service.clone(),
                    value,
                })
            })
            .collect();
        slowest.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.service.cmp(&b.service)));
        slowest.truncate(RANKING_SIZE);

        Self {
            generated_at: Utc::now(),
            total_tests: records.len(),
            overall_success_rate: percent(total_successes, records.len()),
            services,
            least_reliable,
            slowest,
            system_degraded: !degraded_services.is_empty(),
            degraded_services,
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceStatistics> {
        self.services.get(name)
    }

    /// Write the report as pretty JSON.
    pub async fn write_json(&self, path: &Path) -> ResilienceResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgen_models::TestResult;

    fn records() -> Vec<ServiceHealthRecord> {
        vec![
            ServiceHealthRecord::from_result("pexels", &TestResult::success().with_response_time(100)),
            ServiceHealthRecord::from_result("pexels", &TestResult::success().with_response_time(300)),
            ServiceHealthRecord::from_result(
                "pexels",
                &TestResult::failure("rate limited").with_response_time(5000),
            ),
            ServiceHealthRecord::from_error("pexels", "rate limited", None),
            ServiceHealthRecord::from_result(
                "elevenlabs",
                &TestResult::success()
                    .with_response_time(900)
                    .with_fallback("google_tts"),
            ),
        ]
    }

    #[test]
    fn test_per_service_statistics() {
        let report = StatisticsReport::from_records(&records(), vec![]);
        let pexels = report.service("pexels").unwrap();

        assert_eq!(pexels.total_tests, 4);
        assert_eq!(pexels.successes, 2);
        assert_eq!(pexels.failures, 1);
        assert_eq!(pexels.errors, 1);
        assert_eq!(pexels.success_rate, 50.0);
        // Failed probe timings are excluded
        assert_eq!(pexels.average_response_time_ms, Some(200.0));
        assert_eq!(
            pexels.top_errors,
            vec![ErrorCount {
                message: "rate limited".into(),
                count: 2
            }]
        );

        let elevenlabs = report.service("elevenlabs").unwrap();
        assert_eq!(elevenlabs.fallback_rate, 100.0);
    }

    #[test]
    fn test_system_rankings() {
        let report = StatisticsReport::from_records(&records(), vec!["pexels".into()]);

        assert_eq!(report.total_tests, 5);
        assert_eq!(report.overall_success_rate, 60.0);
        assert_eq!(report.least_reliable[0].service, "pexels");
        assert_eq!(report.slowest[0].service, "elevenlabs");
        assert!(report.system_degraded);
    }

    #[test]
    fn test_empty_history() {
        let report = StatisticsReport::from_records(&[], vec![]);
        assert_eq!(report.overall_success_rate, 0.0);
        assert!(report.services.is_empty());
        assert!(!report.system_degraded);
    }

    #[tokio::test]
    async fn test_write_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        let report = StatisticsReport::from_records(&records(), vec![]);

        report.write_json(&path).await.unwrap();

        let back: StatisticsReport =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(back.total_tests, 5);
    }
}
