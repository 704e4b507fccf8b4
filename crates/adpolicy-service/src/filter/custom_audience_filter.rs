//! Composite filter run in front of custom audience calls.

use super::service_filter::{FilterRequest, FledgeFilters};
use super::types::{AdTechIdentifier, AuthorizationResult, FilterRejection, FledgeApiType};

/// Same ordering as the ad selection filter, with enrollment and manifest
/// checks done against the custom audiences section.
pub struct CustomAudienceServiceFilter {
    filters: FledgeFilters,
}

impl CustomAudienceServiceFilter {
    pub fn new(filters: FledgeFilters) -> Self {
        Self { filters }
    }

    pub fn filter_request(&self, req: &FilterRequest<'_>) -> AuthorizationResult {
        self.filters.filter(req, FledgeApiType::CustomAudiences)
    }

    /// Run the chain for the ad tech owning `fetch_uri` and return it.
    ///
    /// `req.ad_tech` is not consulted. With the enrollment check disabled the
    /// URI host is returned unchecked.
    pub fn filter_request_and_extract_identifier(
        &self,
        fetch_uri: &str,
        req: &FilterRequest<'_>,
    ) -> Result<AdTechIdentifier, FilterRejection> {
        let api_type = FledgeApiType::CustomAudiences;
        self.filters.assert_caller_allowed(req, api_type)?;

        let ad_tech = self
            .filters
            .authorization
            .ad_tech_from_uri(req.caller_package, fetch_uri, req.api)?;
        self.filters.assert_ad_tech_allowed(req, &ad_tech, api_type)?;

        self.filters.assert_consent(req)?;
        Ok(ad_tech)
    }
}
