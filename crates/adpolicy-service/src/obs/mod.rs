//! Lightweight in-process metrics and API call stats.
//!
//! Metrics are stored as atomics and rendered by the `/metrics` handler.
//! Filters report every rejection through [`metrics::ApiCallStatsLogger`].

pub mod metrics;

pub use metrics::{ApiCallStats, ApiCallStatsLogger, MetricsApiCallLogger, PolicyMetrics};
