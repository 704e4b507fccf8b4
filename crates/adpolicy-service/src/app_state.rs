//! Shared application state for the policy service.
//!
//! Built once at startup from the validated config, then cloned cheaply
//! into handlers and background tasks.

use std::sync::Arc;

use adpolicy_core::error::Result;

use crate::config::PolicyConfig;
use crate::deny::{
    CacheStore, DenySources, DirectoryFileSource, InstalledPackages, JsonFileCacheStore,
    JsonInstalledPackages, LocalFileStorage, MemoryCacheStore, PackageDenyResolver,
};
use crate::filter::{
    AdSelectionServiceFilter, AllowListsFilter, ApiThrottleFilter, AppImportanceFilter,
    AuthorizationFilter, ConsentFilter, ConsentStore, CustomAudienceServiceFilter,
    EnrollmentStore, FilterSettings, FledgeFilters, PackageIdentity, RunningProcesses,
};
use crate::manifest::{ManifestHelper, ManifestSource};
use crate::obs::{ApiCallStatsLogger, MetricsApiCallLogger, PolicyMetrics};
use crate::throttle::Throttler;

/// Platform lookups the filter chain depends on.
#[derive(Clone)]
pub struct FilterCollaborators {
    pub identity: Arc<dyn PackageIdentity>,
    pub enrollment: Arc<dyn EnrollmentStore>,
    pub consent: Arc<dyn ConsentStore>,
    pub processes: Arc<dyn RunningProcesses>,
    pub manifests: Arc<dyn ManifestSource>,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: PolicyConfig,
    metrics: Arc<PolicyMetrics>,
    logger: Arc<dyn ApiCallStatsLogger>,
    resolver: Arc<PackageDenyResolver>,
    throttler: Arc<Throttler>,
}

impl AppState {
    /// Build state with explicit deny-data collaborators.
    pub fn new(cfg: PolicyConfig, sources: DenySources) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(PolicyMetrics::default());
        let logger: Arc<dyn ApiCallStatsLogger> =
            Arc::new(MetricsApiCallLogger::new(metrics.clone()));
        let resolver = Arc::new(PackageDenyResolver::new(
            cfg.package_deny.clone(),
            sources,
            metrics.clone(),
        ));
        let throttler = Arc::new(Throttler::new(&cfg.throttle));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics,
                logger,
                resolver,
                throttler,
            }),
        })
    }

    /// Build state backed by the local filesystem paths in the config.
    pub fn from_config(cfg: PolicyConfig) -> Result<Self> {
        let store: Arc<dyn CacheStore> = match &cfg.service.cache_path {
            Some(path) => Arc::new(JsonFileCacheStore::new(path)),
            None => Arc::new(MemoryCacheStore::default()),
        };
        let installed_path = &cfg.package_deny.installed_packages_path;
        let installed: Arc<dyn InstalledPackages> = match installed_path {
            Some(path) => Arc::new(JsonInstalledPackages::new(path)),
            None => Arc::new(NoInstalledPackages),
        };

        let sources = DenySources {
            files: Arc::new(DirectoryFileSource::new(&cfg.package_deny.data_dir)),
            storage: Arc::new(LocalFileStorage),
            installed,
            store,
        };
        Self::new(cfg, sources)
    }

    pub fn cfg(&self) -> &PolicyConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> &PolicyMetrics {
        &self.inner.metrics
    }

    pub fn logger(&self) -> Arc<dyn ApiCallStatsLogger> {
        Arc::clone(&self.inner.logger)
    }

    pub fn resolver(&self) -> Arc<PackageDenyResolver> {
        Arc::clone(&self.inner.resolver)
    }

    pub fn throttler(&self) -> Arc<Throttler> {
        Arc::clone(&self.inner.throttler)
    }

    pub fn manifest_helper(&self, source: Arc<dyn ManifestSource>) -> ManifestHelper {
        ManifestHelper::new(
            source,
            self.inner.cfg.manifest.enabled_by_default,
            self.inner.metrics.clone(),
        )
    }

    /// Build the individual filters from config and collaborators.
    pub fn fledge_filters(&self, c: FilterCollaborators) -> FledgeFilters {
        let fledge = &self.inner.cfg.fledge;
        let logger = self.logger();

        let manifest = Arc::new(self.manifest_helper(c.manifests));
        let authorization = AuthorizationFilter::new(
            c.identity,
            c.enrollment,
            manifest,
            fledge.ad_tech_block_list.iter().cloned(),
            logger.clone(),
        );
        let allow_lists =
            AllowListsFilter::new(&fledge.app_allow_list, fledge.pas_allow_list(), logger.clone());
        let consent = ConsentFilter::new(c.consent, logger.clone());
        let importance = AppImportanceFilter::new(
            c.processes,
            fledge.foreground_importance_cutoff,
            logger.clone(),
        );
        let throttle = ApiThrottleFilter::new(self.throttler(), logger);

        FledgeFilters {
            authorization: Arc::new(authorization),
            allow_lists: Arc::new(allow_lists),
            consent: Arc::new(consent),
            importance: Arc::new(importance),
            throttle: Arc::new(throttle),
            settings: FilterSettings::from(fledge),
        }
    }

    /// Assemble the ad selection filter chain from config and collaborators.
    pub fn ad_selection_filter(&self, c: FilterCollaborators) -> AdSelectionServiceFilter {
        AdSelectionServiceFilter::new(self.fledge_filters(c))
    }

    /// Assemble the custom audience filter chain from config and collaborators.
    pub fn custom_audience_filter(&self, c: FilterCollaborators) -> CustomAudienceServiceFilter {
        CustomAudienceServiceFilter::new(self.fledge_filters(c))
    }

    /// Values appended to `/metrics`.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let cache = self.inner.resolver.snapshot();
        vec![
            ("adpolicy_package_deny_enabled", u64::from(self.inner.resolver.is_enabled())),
            ("adpolicy_deny_cache_empty", u64::from(cache.is_empty())),
        ]
    }
}

/// Installed-package lookup when none is configured; only reached if the
/// installed-package filter is on, which config validation rules out.
struct NoInstalledPackages;

#[async_trait::async_trait]
impl InstalledPackages for NoInstalledPackages {
    async fn installed_packages(&self) -> Result<Vec<crate::deny::InstalledPackage>> {
        Err(adpolicy_core::AdPolicyError::NotFound(
            "no installed packages source configured".into(),
        ))
    }
}
