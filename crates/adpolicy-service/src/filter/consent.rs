use std::sync::Arc;

use crate::obs::{ApiCallStats, ApiCallStatsLogger};

use super::types::{AuthorizationResult, ConsentStore, FilterRejection};

pub struct ConsentFilter {
    consent: Arc<dyn ConsentStore>,
    logger: Arc<dyn ApiCallStatsLogger>,
}

impl ConsentFilter {
    pub fn new(consent: Arc<dyn ConsentStore>, logger: Arc<dyn ApiCallStatsLogger>) -> Self {
        Self { consent, logger }
    }

    /// User consent must be given and not revoked for `package`.
    pub fn assert_caller_has_api_user_consent(
        &self,
        package: &str,
        api: i32,
    ) -> AuthorizationResult {
        if self.consent.fledge_consent_given() && !self.consent.is_app_consent_revoked(package) {
            return Ok(());
        }

        tracing::debug!(package = %package, "user consent revoked");
        let rejection = FilterRejection::ConsentRevoked;
        self.logger
            .log_api_call_stats(ApiCallStats::new(api, package, "", rejection.status_code()));
        Err(rejection)
    }
}
