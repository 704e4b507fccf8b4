use std::sync::Arc;

use crate::obs::{ApiCallStats, ApiCallStatsLogger};
use crate::throttle::{ApiKey, Throttler};

use super::types::{AuthorizationResult, FilterRejection};

pub struct ApiThrottleFilter {
    throttler: Arc<Throttler>,
    logger: Arc<dyn ApiCallStatsLogger>,
}

impl ApiThrottleFilter {
    pub fn new(throttler: Arc<Throttler>, logger: Arc<dyn ApiCallStatsLogger>) -> Self {
        Self { throttler, logger }
    }

    pub fn assert_caller_not_throttled(
        &self,
        package: &str,
        api_key: ApiKey,
        api: i32,
    ) -> AuthorizationResult {
        if self.throttler.try_acquire(api_key, package) {
            return Ok(());
        }

        tracing::debug!(package = %package, key = %api_key, "rate limit reached");
        let rejection = FilterRejection::Throttled;
        self.logger
            .log_api_call_stats(ApiCallStats::new(api, package, "", rejection.status_code()));
        Err(rejection)
    }
}
