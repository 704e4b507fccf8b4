//! Per-API, per-requester rate limiting.
//!
//! One token bucket per `(ApiKey, requester)`. Buckets are created lazily on
//! first use and live in a `DashMap`; a bucket is only touched under its
//! shard lock, so unrelated requesters rarely contend. Buckets that have
//! refilled completely carry no state and are pruned.

mod bucket;

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::ThrottleSection;

use bucket::TokenBucket;

/// Throttled API surfaces. The requester is an app package name or an SDK
/// name depending on the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiKey {
    Unknown,
    AdidApiAppPackageName,
    AppsetidApiAppPackageName,
    FledgeApiFetchCustomAudience,
    FledgeApiGetAdSelectionData,
    FledgeApiJoinCustomAudience,
    FledgeApiLeaveCustomAudience,
    FledgeApiPersistAdSelectionResult,
    FledgeApiReportImpressions,
    FledgeApiReportInteraction,
    FledgeApiScheduleCustomAudienceUpdate,
    FledgeApiSelectAds,
    FledgeApiSelectAdsWithOutcomes,
    FledgeApiSetAppInstallAdvertisers,
    FledgeApiUpdateAdCounterHistogram,
    MeasurementApiRegisterSource,
    MeasurementApiRegisterSources,
    MeasurementApiRegisterTrigger,
    MeasurementApiRegisterWebSource,
    MeasurementApiRegisterWebTrigger,
    ProtectedSignalApiUpdateSignals,
    TopicsApiSdkName,
    TopicsApiAppPackageName,
}

impl ApiKey {
    pub const ALL: [ApiKey; 23] = [
        ApiKey::Unknown,
        ApiKey::AdidApiAppPackageName,
        ApiKey::AppsetidApiAppPackageName,
        ApiKey::FledgeApiFetchCustomAudience,
        ApiKey::FledgeApiGetAdSelectionData,
        ApiKey::FledgeApiJoinCustomAudience,
        ApiKey::FledgeApiLeaveCustomAudience,
        ApiKey::FledgeApiPersistAdSelectionResult,
        ApiKey::FledgeApiReportImpressions,
        ApiKey::FledgeApiReportInteraction,
        ApiKey::FledgeApiScheduleCustomAudienceUpdate,
        ApiKey::FledgeApiSelectAds,
        ApiKey::FledgeApiSelectAdsWithOutcomes,
        ApiKey::FledgeApiSetAppInstallAdvertisers,
        ApiKey::FledgeApiUpdateAdCounterHistogram,
        ApiKey::MeasurementApiRegisterSource,
        ApiKey::MeasurementApiRegisterSources,
        ApiKey::MeasurementApiRegisterTrigger,
        ApiKey::MeasurementApiRegisterWebSource,
        ApiKey::MeasurementApiRegisterWebTrigger,
        ApiKey::ProtectedSignalApiUpdateSignals,
        ApiKey::TopicsApiSdkName,
        ApiKey::TopicsApiAppPackageName,
    ];

    /// Name used in config files and dumps.
    pub fn as_str(self) -> &'static str {
        match self {
            ApiKey::Unknown => "UNKNOWN",
            ApiKey::AdidApiAppPackageName => "ADID_API_APP_PACKAGE_NAME",
            ApiKey::AppsetidApiAppPackageName => "APPSETID_API_APP_PACKAGE_NAME",
            ApiKey::FledgeApiFetchCustomAudience => "FLEDGE_API_FETCH_CUSTOM_AUDIENCE",
            ApiKey::FledgeApiGetAdSelectionData => "FLEDGE_API_GET_AD_SELECTION_DATA",
            ApiKey::FledgeApiJoinCustomAudience => "FLEDGE_API_JOIN_CUSTOM_AUDIENCE",
            ApiKey::FledgeApiLeaveCustomAudience => "FLEDGE_API_LEAVE_CUSTOM_AUDIENCE",
            ApiKey::FledgeApiPersistAdSelectionResult => "FLEDGE_API_PERSIST_AD_SELECTION_RESULT",
            ApiKey::FledgeApiReportImpressions => "FLEDGE_API_REPORT_IMPRESSIONS",
            ApiKey::FledgeApiReportInteraction => "FLEDGE_API_REPORT_INTERACTION",
            ApiKey::FledgeApiScheduleCustomAudienceUpdate => {
                "FLEDGE_API_SCHEDULE_CUSTOM_AUDIENCE_UPDATE"
            }
            ApiKey::FledgeApiSelectAds => "FLEDGE_API_SELECT_ADS",
            ApiKey::FledgeApiSelectAdsWithOutcomes => "FLEDGE_API_SELECT_ADS_WITH_OUTCOMES",
            ApiKey::FledgeApiSetAppInstallAdvertisers => "FLEDGE_API_SET_APP_INSTALL_ADVERTISERS",
            ApiKey::FledgeApiUpdateAdCounterHistogram => "FLEDGE_API_UPDATE_AD_COUNTER_HISTOGRAM",
            ApiKey::MeasurementApiRegisterSource => "MEASUREMENT_API_REGISTER_SOURCE",
            ApiKey::MeasurementApiRegisterSources => "MEASUREMENT_API_REGISTER_SOURCES",
            ApiKey::MeasurementApiRegisterTrigger => "MEASUREMENT_API_REGISTER_TRIGGER",
            ApiKey::MeasurementApiRegisterWebSource => "MEASUREMENT_API_REGISTER_WEB_SOURCE",
            ApiKey::MeasurementApiRegisterWebTrigger => "MEASUREMENT_API_REGISTER_WEB_TRIGGER",
            ApiKey::ProtectedSignalApiUpdateSignals => "PROTECTED_SIGNAL_API_UPDATE_SIGNALS",
            ApiKey::TopicsApiSdkName => "TOPICS_API_SDK_NAME",
            ApiKey::TopicsApiAppPackageName => "TOPICS_API_APP_PACKAGE_NAME",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate limiter shared by every filter that enforces request budgets.
pub struct Throttler {
    permits: HashMap<ApiKey, f64>,
    buckets: DashMap<(ApiKey, String), TokenBucket>,
}

impl Throttler {
    pub fn new(cfg: &ThrottleSection) -> Self {
        let permits = ApiKey::ALL
            .into_iter()
            .map(|key| (key, cfg.permits_for(key)))
            .collect();
        Self {
            permits,
            buckets: DashMap::new(),
        }
    }

    /// Same permit rate for every key.
    pub fn with_uniform_rate(permits_per_second: f64) -> Self {
        Self::new(&ThrottleSection {
            default_permits_per_second: permits_per_second,
            per_api: Default::default(),
        })
    }

    fn permits_for(&self, key: ApiKey) -> f64 {
        self.permits.get(&key).copied().unwrap_or(1.0)
    }

    /// Take one permit for `requester` on `key` without blocking.
    pub fn try_acquire(&self, key: ApiKey, requester: &str) -> bool {
        let permits = self.permits_for(key);
        if permits < 0.0 {
            return true;
        }

        self.buckets
            .entry((key, requester.to_string()))
            .or_insert_with(|| TokenBucket::new(permits))
            .try_take()
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets that are full again. A full bucket behaves exactly like
    /// the fresh one `try_acquire` would create. Returns how many went.
    pub fn prune_idle(&self) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_idle());
        let pruned = before.saturating_sub(self.buckets.len());
        if pruned > 0 {
            tracing::debug!(pruned, remaining = self.buckets.len(), "pruned idle throttle buckets");
        }
        pruned
    }

    /// Call [`Self::prune_idle`] every `interval` on the tokio runtime.
    pub fn spawn_prune_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let throttler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                throttler.prune_idle();
            }
        })
    }

    /// Human readable state, one line per key then one per active bucket.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Throttler");
        let _ = writeln!(out, "  Rate limit per API");

        let mut keys: Vec<ApiKey> = ApiKey::ALL.to_vec();
        keys.sort_by_key(|k| k.as_str());
        for key in keys {
            let _ = writeln!(out, "    {}: {}", key, describe_rate(self.permits_for(key)));
        }

        let mut lines: Vec<String> = self
            .buckets
            .iter()
            .map(|r| {
                let (key, requester) = r.key();
                format!("    {key} {requester}: tokens={:.2}", r.value().available())
            })
            .collect();

        if lines.is_empty() {
            let _ = writeln!(out, "  SDK rate limit per API: N/A");
            return out;
        }

        lines.sort();
        let _ = writeln!(out, "  SDK rate limit per API:");
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
        out
    }
}

fn describe_rate(permits: f64) -> String {
    if permits < 0.0 {
        "unlimited".to_string()
    } else {
        format!("{permits} permits/s")
    }
}
