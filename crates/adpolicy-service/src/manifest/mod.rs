//! Per-app manifest config lookups.
//!
//! The app's config document is fetched through [`ManifestSource`], parsed
//! with the core parser and queried per API surface. Every failure denies:
//! a missing package, an unparsable config, or a source error.

use std::sync::Arc;

use adpolicy_core::error::{AdPolicyError, Result};
use adpolicy_core::manifest::{parse_config, AccessResult, ApiSurface, AppManifestConfig};

use crate::obs::PolicyMetrics;

/// Where app manifest config documents come from.
pub trait ManifestSource: Send + Sync {
    /// Config XML for `package`; `Ok(None)` when the app ships no config,
    /// `Err(PackageNotFound)` when the app is not installed.
    fn fetch(&self, package: &str) -> Result<Option<String>>;
}

pub struct ManifestHelper {
    source: Arc<dyn ManifestSource>,
    enabled_by_default: bool,
    metrics: Arc<PolicyMetrics>,
}

/// Config lookup result before any API section is consulted.
enum Lookup {
    Config(AppManifestConfig),
    Denied(AccessResult),
    NoConfig,
}

impl ManifestHelper {
    pub fn new(
        source: Arc<dyn ManifestSource>,
        enabled_by_default: bool,
        metrics: Arc<PolicyMetrics>,
    ) -> Self {
        Self {
            source,
            enabled_by_default,
            metrics,
        }
    }

    fn lookup(&self, package: &str) -> Lookup {
        let xml = match self.source.fetch(package) {
            Ok(Some(xml)) => xml,
            Ok(None) => return Lookup::NoConfig,
            Err(AdPolicyError::PackageNotFound(_)) => {
                tracing::debug!(package = %package, "package not found for manifest lookup");
                return Lookup::Denied(AccessResult::DisallowedAppNotFound);
            }
            Err(e) => {
                tracing::error!(package = %package, error = %e, "manifest config fetch failed");
                return Lookup::Denied(AccessResult::DisallowedAppConfigParsingError);
            }
        };

        match parse_config(&xml, self.enabled_by_default) {
            Ok(cfg) => Lookup::Config(cfg),
            Err(e) => {
                tracing::error!(
                    package = %package,
                    error = %e,
                    "app manifest config parsing failed"
                );
                self.metrics.manifest_parse_errors.inc(&[("package", package)]);
                Lookup::Denied(AccessResult::DisallowedAppConfigParsingError)
            }
        }
    }

    fn no_config_result(&self) -> AccessResult {
        if self.enabled_by_default {
            AccessResult::AllowedByDefaultAppDoesNotHaveConfig
        } else {
            AccessResult::DisallowedAppDoesNotHaveConfig
        }
    }

    /// Detailed outcome for `package` granting `enrollment_id` access to `surface`.
    pub fn access_result(
        &self,
        package: &str,
        surface: ApiSurface,
        enrollment_id: &str,
    ) -> AccessResult {
        let result = match self.lookup(package) {
            Lookup::Config(cfg) => cfg.is_allowed_access(surface, enrollment_id),
            Lookup::Denied(r) => r,
            Lookup::NoConfig => self.no_config_result(),
        };
        tracing::trace!(
            package = %package,
            api = surface.tag(),
            enrollment = %enrollment_id,
            result = ?result,
            "manifest access check"
        );
        result
    }

    pub fn is_allowed_attribution_access(&self, package: &str, enrollment_id: &str) -> bool {
        self.access_result(package, ApiSurface::Attribution, enrollment_id).is_allowed()
    }

    pub fn is_allowed_custom_audiences_access(&self, package: &str, enrollment_id: &str) -> bool {
        self.access_result(package, ApiSurface::CustomAudiences, enrollment_id).is_allowed()
    }

    pub fn is_allowed_protected_signals_access(&self, package: &str, enrollment_id: &str) -> bool {
        self.access_result(package, ApiSurface::ProtectedSignals, enrollment_id).is_allowed()
    }

    pub fn is_allowed_ad_selection_access(&self, package: &str, enrollment_id: &str) -> bool {
        self.access_result(package, ApiSurface::AdSelection, enrollment_id).is_allowed()
    }

    pub fn is_allowed_ad_id_access(&self, package: &str, enrollment_id: &str) -> bool {
        self.access_result(package, ApiSurface::AdId, enrollment_id).is_allowed()
    }

    pub fn is_allowed_app_set_id_access(&self, package: &str, enrollment_id: &str) -> bool {
        self.access_result(package, ApiSurface::AppSetId, enrollment_id).is_allowed()
    }

    /// Topics access. Calls that did not come through the SDK sandbox also
    /// require the SDK to be declared in `<includes-sdk-library>`.
    pub fn is_allowed_topics_access(
        &self,
        use_sandbox_check: bool,
        package: &str,
        enrollment_id: &str,
    ) -> bool {
        match self.lookup(package) {
            Lookup::Config(cfg) => {
                if !use_sandbox_check && !cfg.includes_sdk_library.contains(enrollment_id) {
                    tracing::debug!(
                        package = %package,
                        sdk = %enrollment_id,
                        "sdk not declared in includes-sdk-library"
                    );
                    return false;
                }
                cfg.is_allowed_topics_access(enrollment_id).is_allowed()
            }
            Lookup::Denied(_) => false,
            Lookup::NoConfig => self.enabled_by_default,
        }
    }
}
