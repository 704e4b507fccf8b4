//! Minimal metrics registry for the policy service.
//!
//! Counter/gauge/histogram types with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors to keep deterministic
//! ordering. Histogram buckets are fixed in microseconds.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use adpolicy_core::StatusCode;

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut key: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &[(String, String)]) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 when never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        let mut rows: Vec<(String, u64)> = self
            .map
            .iter()
            .map(|r| (label_str(r.key()), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        for (labels, val) in rows {
            let _ = writeln!(out, "{}{{{}}} {}", name, labels, val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<Vec<(String, String)>, AtomicI64>,
}

impl GaugeVec {
    pub fn set(&self, labels: &[(&str, &str)], v: i64) {
        let gauge = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0));
        gauge.store(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} gauge", name);
        let mut rows: Vec<(String, i64)> = self
            .map
            .iter()
            .map(|r| (label_str(r.key()), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        for (labels, val) in rows {
            let _ = writeln!(out, "{}{{{}}} {}", name, labels, val);
        }
    }
}

// 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s, 5s, 30s
const BUCKETS_MICROS: [u64; 9] = [
    1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000, 5_000_000, 30_000_000,
];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 9],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<Vec<(String, String)>, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration and increment cumulative buckets (microsecond scale).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);

        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for r in self.map.iter() {
            let hist = r.value();
            let labels = label_str(r.key());
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{},", labels)
            };

            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);
            let sum = hist.sum.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

#[derive(Default)]
pub struct PolicyMetrics {
    pub api_call_stats: CounterVec,
    pub deny_process_status: CounterVec,
    pub deny_decisions: CounterVec,
    pub deny_cache_entries: GaugeVec,
    pub deny_refresh_duration: HistogramVec, // In Microseconds
    pub manifest_parse_errors: CounterVec,
}

impl PolicyMetrics {
    /// Render all registered metrics plus any extra lines provided by callers.
    pub fn render(&self, extra: &[(&str, u64)]) -> String {
        let mut out = String::new();
        self.api_call_stats.render("adpolicy_api_call_stats_total", &mut out);
        self.deny_process_status.render("adpolicy_deny_process_status_total", &mut out);
        self.deny_decisions.render("adpolicy_deny_decisions_total", &mut out);
        self.deny_cache_entries.render("adpolicy_deny_cache_entries", &mut out);
        self.deny_refresh_duration
            .render("adpolicy_deny_refresh_duration_micros", &mut out);
        self.manifest_parse_errors
            .render("adpolicy_manifest_parse_errors_total", &mut out);

        for (k, v) in extra {
            let _ = writeln!(out, "{} {}", k, v);
        }
        out
    }
}

/// One API call outcome, as reported by the filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCallStats {
    pub api_name: i32,
    pub app_package_name: String,
    pub sdk_package_name: String,
    pub result_code: StatusCode,
}

impl ApiCallStats {
    pub fn new(
        api_name: i32,
        app_package_name: &str,
        sdk_package_name: &str,
        result_code: StatusCode,
    ) -> Self {
        Self {
            api_name,
            app_package_name: app_package_name.to_string(),
            sdk_package_name: sdk_package_name.to_string(),
            result_code,
        }
    }
}

/// Sink for API call stats records.
pub trait ApiCallStatsLogger: Send + Sync {
    fn log_api_call_stats(&self, stats: ApiCallStats);
}

/// Default logger: counts records by API and status, and traces them.
pub struct MetricsApiCallLogger {
    metrics: std::sync::Arc<PolicyMetrics>,
}

impl MetricsApiCallLogger {
    pub fn new(metrics: std::sync::Arc<PolicyMetrics>) -> Self {
        Self { metrics }
    }
}

impl ApiCallStatsLogger for MetricsApiCallLogger {
    fn log_api_call_stats(&self, stats: ApiCallStats) {
        let api = stats.api_name.to_string();
        self.metrics.api_call_stats.inc(&[
            ("api", api.as_str()),
            ("status", stats.result_code.as_str()),
        ]);
        tracing::debug!(
            api = stats.api_name,
            app = %stats.app_package_name,
            sdk = %stats.sdk_package_name,
            status = %stats.result_code,
            code = stats.result_code.as_i32(),
            "api call stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_render_sorted_and_escaped() {
        let m = PolicyMetrics::default();
        m.deny_decisions.inc(&[("result", "deny")]);
        m.deny_decisions.inc(&[("result", "allow")]);
        m.deny_decisions.inc(&[("result", "deny")]);
        m.manifest_parse_errors.inc(&[("reason", "a\"b")]);

        let out = m.render(&[("adpolicy_up", 1)]);
        let allow = out.find("result=\"allow\"} 1").unwrap_or(usize::MAX);
        let deny = out.find("result=\"deny\"} 2").unwrap_or(0);
        assert!(allow < deny);
        assert!(out.contains("reason=\"a\\\"b\""));
        assert!(out.ends_with("adpolicy_up 1\n"));
    }

    #[test]
    fn logger_counts_by_api_and_status() {
        let metrics = Arc::new(PolicyMetrics::default());
        let logger = MetricsApiCallLogger::new(metrics.clone());
        logger.log_api_call_stats(ApiCallStats::new(7, "app", "", StatusCode::RateLimitReached));
        logger.log_api_call_stats(ApiCallStats::new(7, "app", "", StatusCode::RateLimitReached));

        assert_eq!(
            metrics
                .api_call_stats
                .get(&[("status", "RATE_LIMIT_REACHED"), ("api", "7")]),
            2
        );
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let h = HistogramVec::default();
        h.observe(&[], Duration::from_millis(3));
        let mut out = String::new();
        h.render("x", &mut out);
        assert!(out.contains("x_bucket{le=\"1000\"} 0"));
        assert!(out.contains("x_bucket{le=\"5000\"} 1"));
        assert!(out.contains("x_bucket{le=\"+Inf\"} 1"));
        assert!(out.contains("x_count{} 1"));
    }
}
