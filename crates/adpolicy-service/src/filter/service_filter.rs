//! Composite filter run in front of every ad selection call.

use std::sync::Arc;

use crate::config::FledgeSection;
use crate::throttle::ApiKey;

use super::allowlist::AllowListsFilter;
use super::authorization::AuthorizationFilter;
use super::consent::ConsentFilter;
use super::importance::AppImportanceFilter;
use super::throttle::ApiThrottleFilter;
use super::types::{AdTechIdentifier, AuthorizationResult, DevContext, FledgeApiType};

/// Inputs of one ad selection request.
#[derive(Debug, Clone)]
pub struct FilterRequest<'a> {
    /// Seller or buyer to check; enrollment checks are skipped when absent.
    pub ad_tech: Option<&'a AdTechIdentifier>,
    pub caller_package: &'a str,
    pub enforce_foreground: bool,
    pub enforce_consent: bool,
    pub enforce_not_throttled: bool,
    pub caller_uid: u32,
    pub api: i32,
    pub api_key: ApiKey,
    pub dev_context: &'a DevContext,
}

/// Service-wide switches applied on top of the per-request flags.
///
/// A check runs only when both the request and the service enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSettings {
    pub disable_enrollment_check: bool,
    pub enforce_foreground: bool,
    pub enforce_consent: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            disable_enrollment_check: false,
            enforce_foreground: true,
            enforce_consent: true,
        }
    }
}

impl From<&FledgeSection> for FilterSettings {
    fn from(fledge: &FledgeSection) -> Self {
        Self {
            disable_enrollment_check: fledge.disable_enrollment_check,
            enforce_foreground: fledge.enforce_foreground,
            enforce_consent: fledge.enforce_consent,
        }
    }
}

/// The individual filters a composite runs, plus its settings.
#[derive(Clone)]
pub struct FledgeFilters {
    pub authorization: Arc<AuthorizationFilter>,
    pub allow_lists: Arc<AllowListsFilter>,
    pub consent: Arc<ConsentFilter>,
    pub importance: Arc<AppImportanceFilter>,
    pub throttle: Arc<ApiThrottleFilter>,
    pub settings: FilterSettings,
}

impl FledgeFilters {
    /// Identity, throttling, foreground and allowlist, in that order.
    pub(crate) fn assert_caller_allowed(
        &self,
        req: &FilterRequest<'_>,
        api_type: FledgeApiType,
    ) -> AuthorizationResult {
        let package = req.caller_package;

        self.authorization
            .assert_calling_package_name(package, req.caller_uid, req.api)?;

        if req.enforce_not_throttled {
            self.throttle
                .assert_caller_not_throttled(package, req.api_key, req.api)?;
        }

        if req.enforce_foreground && self.settings.enforce_foreground {
            self.importance
                .assert_caller_is_in_foreground(req.caller_uid, req.api, None)?;
        }

        self.allow_lists
            .assert_app_in_allowlist(package, req.api, api_type)
    }

    /// Enrollment and manifest checks for `ad_tech`, unless the service has
    /// them disabled or the caller's developer options allow a loopback host.
    pub(crate) fn assert_ad_tech_allowed(
        &self,
        req: &FilterRequest<'_>,
        ad_tech: &AdTechIdentifier,
        api_type: FledgeApiType,
    ) -> AuthorizationResult {
        let package = req.caller_package;
        if self.settings.disable_enrollment_check {
            tracing::debug!(ad_tech = %ad_tech, "enrollment check disabled");
            return Ok(());
        }
        if req.dev_context.allows_unenrolled(package, ad_tech) {
            tracing::debug!(ad_tech = %ad_tech, package = %package, "developer localhost override");
            return Ok(());
        }
        self.authorization
            .assert_ad_tech_allowed(package, ad_tech, req.api, api_type)
    }

    pub(crate) fn assert_consent(&self, req: &FilterRequest<'_>) -> AuthorizationResult {
        if req.enforce_consent && self.settings.enforce_consent {
            self.consent
                .assert_caller_has_api_user_consent(req.caller_package, req.api)?;
        }
        Ok(())
    }

    /// Full chain for `api_type`; the first rejection is returned.
    pub(crate) fn filter(
        &self,
        req: &FilterRequest<'_>,
        api_type: FledgeApiType,
    ) -> AuthorizationResult {
        self.assert_caller_allowed(req, api_type)?;
        if let Some(ad_tech) = req.ad_tech {
            self.assert_ad_tech_allowed(req, ad_tech, api_type)?;
        }
        self.assert_consent(req)
    }
}

pub struct AdSelectionServiceFilter {
    filters: FledgeFilters,
}

impl AdSelectionServiceFilter {
    pub fn new(filters: FledgeFilters) -> Self {
        Self { filters }
    }

    /// Run the checks in order: caller identity, throttling, foreground,
    /// allowlist, ad tech, consent. The first rejection is returned.
    pub fn filter_request(&self, req: &FilterRequest<'_>) -> AuthorizationResult {
        self.filters.filter(req, FledgeApiType::AdSelection)
    }
}
