//! Per-host fetch statistics for one run.
//!
//! Counts are keyed by host rather than by series so that a blocking site shows
//! up once in the summary no matter how many series it hosts.

use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize)]
pub struct HostMetrics {
    pub host: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retry_count: u64,
    pub escalations: u64,
    pub blocked: u64,
    pub timeouts: u64,
    pub rate_limit_hits: u64,
    pub total_response_time_ms: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl HostMetrics {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    pub fn average_response_time_ms(&self) -> f64 {
        if self.successful_requests == 0 {
            0.0
        } else {
            self.total_response_time_ms as f64 / self.successful_requests as f64
        }
    }

    pub fn record_success(&mut self, elapsed: Duration) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.total_response_time_ms += elapsed.as_millis() as u64;
        self.last_success = Some(Utc::now());
    }

    pub fn record_failure(&mut self, error: &FetchError) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_failure = Some(Utc::now());
        self.last_error = Some(error.to_string());

        match error {
            FetchError::Blocked { status: Some(429), .. } | FetchError::Status(429) => {
                self.rate_limit_hits += 1
            }
            FetchError::Blocked { .. } => self.blocked += 1,
            FetchError::Timeout(_) => self.timeouts += 1,
            _ => {}
        }
    }
}

/// Shared across fetch tasks; cloning shares the same counters.
#[derive(Clone, Default)]
pub struct MetricsTracker {
    hosts: Arc<Mutex<HashMap<String, HostMetrics>>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HostMetrics>> {
        // A panic while holding the lock leaves counters usable
        self.hosts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_host<R>(&self, host: &str, f: impl FnOnce(&mut HostMetrics) -> R) -> R {
        let mut hosts = self.lock();
        let entry = hosts
            .entry(host.to_string())
            .or_insert_with(|| HostMetrics::new(host));
        f(entry)
    }

    pub fn record_success(&self, host: &str, elapsed: Duration) {
        self.with_host(host, |m| m.record_success(elapsed));
        log::debug!("[{}] fetched in {}ms", host, elapsed.as_millis());
    }

    pub fn record_failure(&self, host: &str, error: &FetchError) {
        let rate = self.with_host(host, |m| {
            m.record_failure(error);
            m.success_rate()
        });
        log::debug!("[{}] attempt failed: {} (success rate {:.1}%)", host, error, rate);
    }

    pub fn record_retry(&self, host: &str) {
        self.with_host(host, |m| m.retry_count += 1);
    }

    pub fn record_escalation(&self, host: &str) {
        self.with_host(host, |m| m.escalations += 1);
    }

    pub fn get(&self, host: &str) -> Option<HostMetrics> {
        self.lock().get(host).cloned()
    }

    /// Snapshot sorted by host name
    pub fn snapshot(&self) -> Vec<HostMetrics> {
        let mut all: Vec<HostMetrics> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.host.cmp(&b.host));
        all
    }

    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "[]".to_string())
    }

    /// One info line per host, worst success rate first
    pub fn log_summary(&self) {
        let mut all = self.snapshot();
        if all.is_empty() {
            return;
        }
        all.sort_by(|a, b| a.success_rate().total_cmp(&b.success_rate()));

        log::info!("=== Fetch summary by host ===");
        for m in all {
            log::info!(
                "{}: {}/{} ok ({:.0}%), avg {:.0}ms, retries {}, rendered {}, blocked {}, timeouts {}, rate limited {}",
                m.host,
                m.successful_requests,
                m.total_requests,
                m.success_rate(),
                m.average_response_time_ms(),
                m.retry_count,
                m.escalations,
                m.blocked,
                m.timeouts,
                m.rate_limit_hits
            );
            if let Some(err) = &m.last_error {
                log::debug!("{}: last error: {}", m.host, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_metrics_creation() {
        let m = HostMetrics::new("zonatmo.com");
        assert_eq!(m.host, "zonatmo.com");
        assert_eq!(m.total_requests, 0);
        assert_eq!(m.success_rate(), 0.0);
    }

    #[test]
    fn test_failure_categories() {
        let mut m = HostMetrics::new("h");
        m.record_failure(&FetchError::Blocked { status: Some(403), detail: "forbidden".into() });
        m.record_failure(&FetchError::Blocked { status: Some(429), detail: "too many requests".into() });
        m.record_failure(&FetchError::Timeout(Duration::from_secs(5)));
        m.record_failure(&FetchError::Status(404));

        assert_eq!(m.failed_requests, 4);
        assert_eq!(m.blocked, 1);
        assert_eq!(m.rate_limit_hits, 1);
        assert_eq!(m.timeouts, 1);
        assert_eq!(m.last_error.as_deref(), Some("unexpected HTTP status 404"));
    }

    #[test]
    fn test_success_rate_calculation() {
        let mut m = HostMetrics::new("h");
        m.record_success(Duration::from_millis(100));
        m.record_success(Duration::from_millis(300));
        m.record_failure(&FetchError::Network("reset".into()));

        assert_eq!(m.total_requests, 3);
        assert!((m.success_rate() - 66.66).abs() < 0.1);
        assert_eq!(m.average_response_time_ms(), 200.0);
    }

    #[test]
    fn test_tracker_is_shared_between_clones() {
        let tracker = MetricsTracker::new();
        let other = tracker.clone();

        tracker.record_success("a.com", Duration::from_millis(10));
        other.record_retry("a.com");
        other.record_escalation("b.com");

        let a = tracker.get("a.com").unwrap();
        assert_eq!(a.successful_requests, 1);
        assert_eq!(a.retry_count, 1);
        assert_eq!(tracker.get("b.com").unwrap().escalations, 1);

        let hosts: Vec<String> = tracker.snapshot().into_iter().map(|m| m.host).collect();
        assert_eq!(hosts, vec!["a.com", "b.com"]);
        assert!(tracker.export_json().contains("\"escalations\": 1"));
    }
}
