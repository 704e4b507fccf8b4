//! Caller identity and ad tech enrollment checks.

use std::collections::HashSet;
use std::sync::Arc;

use adpolicy_core::StatusCode;

use crate::manifest::ManifestHelper;
use crate::obs::{ApiCallStats, ApiCallStatsLogger};

use super::types::{
    AdTechIdentifier, AuthorizationResult, EnrollmentData, EnrollmentStore, FilterRejection,
    FledgeApiType, PackageIdentity,
};

pub struct AuthorizationFilter {
    identity: Arc<dyn PackageIdentity>,
    enrollment: Arc<dyn EnrollmentStore>,
    manifest: Arc<ManifestHelper>,
    block_list: HashSet<String>,
    logger: Arc<dyn ApiCallStatsLogger>,
}

impl AuthorizationFilter {
    pub fn new(
        identity: Arc<dyn PackageIdentity>,
        enrollment: Arc<dyn EnrollmentStore>,
        manifest: Arc<ManifestHelper>,
        block_list: impl IntoIterator<Item = String>,
        logger: Arc<dyn ApiCallStatsLogger>,
    ) -> Self {
        Self {
            identity,
            enrollment,
            manifest,
            block_list: block_list.into_iter().collect(),
            logger,
        }
    }

    /// `package` must be one of the packages running as `uid`.
    pub fn assert_calling_package_name(
        &self,
        package: &str,
        uid: u32,
        api: i32,
    ) -> AuthorizationResult {
        let owned = self.identity.packages_for_uid(uid);
        if owned.iter().any(|p| p == package) {
            return Ok(());
        }

        tracing::warn!(package = %package, uid, "caller package does not match uid");
        self.reject(api, package, FilterRejection::CallerMismatch)
    }

    /// The ad tech must be enrolled for `api_type`, granted access by the
    /// app's manifest config, and not blocklisted.
    pub fn assert_ad_tech_allowed(
        &self,
        package: &str,
        ad_tech: &AdTechIdentifier,
        api: i32,
        api_type: FledgeApiType,
    ) -> AuthorizationResult {
        let Some(enrollment) = self.enrollment_for(ad_tech, api_type) else {
            tracing::debug!(ad_tech = %ad_tech, ?api_type, "no enrollment for ad tech");
            return self.reject_ad_tech(
                api,
                package,
                StatusCode::CallerNotAllowedEnrollmentMatchNotFound,
            );
        };

        let id = enrollment.enrollment_id.as_str();
        let access = self.manifest.access_result(package, api_type.surface(), id);
        if !access.is_allowed() {
            tracing::debug!(
                package = %package,
                enrollment = %id,
                ?access,
                "app manifest config denies ad tech"
            );
            return self.reject_ad_tech(
                api,
                package,
                StatusCode::CallerNotAllowedManifestAdservicesConfigNoPermission,
            );
        }

        if self.block_list.contains(id) {
            tracing::debug!(enrollment = %id, "ad tech enrollment is blocklisted");
            return self.reject_ad_tech(
                api,
                package,
                StatusCode::CallerNotAllowedEnrollmentBlocklisted,
            );
        }

        Ok(())
    }

    /// Host of `uri` as an ad tech, without any enrollment check.
    pub fn ad_tech_from_uri(
        &self,
        package: &str,
        uri: &str,
        api: i32,
    ) -> Result<AdTechIdentifier, FilterRejection> {
        AdTechIdentifier::from_uri(uri).ok_or_else(|| {
            tracing::debug!(uri = %uri, "ad tech uri has no host");
            self.logged(
                api,
                package,
                FilterRejection::AdTechNotAllowed {
                    status: StatusCode::CallerNotAllowedEnrollmentMatchNotFound,
                },
            )
        })
    }

    /// Enrollment-only variant used where no app manifest applies.
    pub fn assert_ad_tech_enrolled(
        &self,
        ad_tech: &AdTechIdentifier,
        api: i32,
    ) -> AuthorizationResult {
        let Some(enrollment) = self.enrollment.fledge_enrollment(ad_tech) else {
            let status = StatusCode::CallerNotAllowedEnrollmentMatchNotFound;
            return self.reject_ad_tech(api, "", status);
        };
        if self.block_list.contains(&enrollment.enrollment_id) {
            let status = StatusCode::CallerNotAllowedEnrollmentBlocklisted;
            return self.reject_ad_tech(api, "", status);
        }
        Ok(())
    }

    fn enrollment_for(
        &self,
        ad_tech: &AdTechIdentifier,
        api_type: FledgeApiType,
    ) -> Option<EnrollmentData> {
        match api_type {
            FledgeApiType::CustomAudiences => self.enrollment.fledge_enrollment(ad_tech),
            FledgeApiType::ProtectedSignals => self.enrollment.pas_enrollment(ad_tech),
            FledgeApiType::AdSelection => self
                .enrollment
                .fledge_enrollment(ad_tech)
                .or_else(|| self.enrollment.pas_enrollment(ad_tech)),
        }
    }

    fn reject_ad_tech(&self, api: i32, package: &str, status: StatusCode) -> AuthorizationResult {
        self.reject(api, package, FilterRejection::AdTechNotAllowed { status })
    }

    fn reject(&self, api: i32, package: &str, rejection: FilterRejection) -> AuthorizationResult {
        Err(self.logged(api, package, rejection))
    }

    fn logged(&self, api: i32, package: &str, rejection: FilterRejection) -> FilterRejection {
        self.logger
            .log_api_call_stats(ApiCallStats::new(api, package, "", rejection.status_code()));
        rejection
    }
}
