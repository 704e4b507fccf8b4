use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use adpolicy_core::error::Result;
use adpolicy_core::protocol::deny_data::{decode_deny_data, PackageToApiDenyGroupsMap};

use crate::config::PackageDenySection;
use crate::obs::PolicyMetrics;

use super::cache::DenyGroupCache;
use super::sources::{
    CacheStore, ClientFile, ClientFileGroup, DenyFileSource, FileStorage, InstalledPackages,
};

/// Outcome of a deny-data refresh or cache restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageDenyProcessStatus {
    Success,
    Disabled,
    Failure,
    NoFileFound,
    FailedReadingFile,
    FailedFilteringInstalledPackages,
    FailedUpdatingCache,
    FailedReadingCache,
}

impl PackageDenyProcessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageDenyProcessStatus::Success => "SUCCESS",
            PackageDenyProcessStatus::Disabled => "DISABLED",
            PackageDenyProcessStatus::Failure => "FAILURE",
            PackageDenyProcessStatus::NoFileFound => "NO_FILE_FOUND",
            PackageDenyProcessStatus::FailedReadingFile => "FAILED_READING_FILE",
            PackageDenyProcessStatus::FailedFilteringInstalledPackages => {
                "FAILED_FILTERING_INSTALLED_PACKAGES"
            }
            PackageDenyProcessStatus::FailedUpdatingCache => "FAILED_UPDATING_CACHE",
            PackageDenyProcessStatus::FailedReadingCache => "FAILED_READING_CACHE",
        }
    }

    /// Error code reported for the status; `-1` for success.
    pub fn error_code(self) -> i32 {
        match self {
            PackageDenyProcessStatus::Success => -1,
            PackageDenyProcessStatus::Disabled => 1001,
            PackageDenyProcessStatus::Failure => 1002,
            PackageDenyProcessStatus::NoFileFound => 1003,
            PackageDenyProcessStatus::FailedReadingFile => 1004,
            PackageDenyProcessStatus::FailedFilteringInstalledPackages => 1005,
            PackageDenyProcessStatus::FailedUpdatingCache => 1006,
            PackageDenyProcessStatus::FailedReadingCache => 1007,
        }
    }
}

impl std::fmt::Display for PackageDenyProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Injected collaborators of the resolver.
#[derive(Clone)]
pub struct DenySources {
    pub files: Arc<dyn DenyFileSource>,
    pub storage: Arc<dyn FileStorage>,
    pub installed: Arc<dyn InstalledPackages>,
    pub store: Arc<dyn CacheStore>,
}

/// Decides whether an app or SDK is denied a set of API groups.
///
/// Lookups read an immutable snapshot; a refresh builds a new cache,
/// persists it and swaps the snapshot, so readers see either the old or the
/// new data and never a mix. A failed refresh keeps the old snapshot.
pub struct PackageDenyResolver {
    cfg: PackageDenySection,
    sources: DenySources,
    snapshot: RwLock<Arc<DenyGroupCache>>,
    /// Held across a whole refresh so persist and swap stay paired.
    refresh_lock: tokio::sync::Mutex<()>,
    metrics: Arc<PolicyMetrics>,
}

impl PackageDenyResolver {
    pub fn new(cfg: PackageDenySection, sources: DenySources, metrics: Arc<PolicyMetrics>) -> Self {
        Self {
            cfg,
            sources,
            snapshot: RwLock::new(Arc::new(DenyGroupCache::default())),
            refresh_lock: tokio::sync::Mutex::new(()),
            metrics,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cfg.enabled
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<DenyGroupCache> {
        match self.snapshot.read() {
            Ok(g) => Arc::clone(&g),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn swap(&self, cache: DenyGroupCache) {
        self.metrics
            .deny_cache_entries
            .set(&[("kind", "app")], cache.app_count() as i64);
        self.metrics
            .deny_cache_entries
            .set(&[("kind", "sdk")], cache.sdk_count() as i64);

        let next = Arc::new(cache);
        match self.snapshot.write() {
            Ok(mut g) => *g = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// True iff `caller_app` or `caller_sdk` has a deny group in `api_groups`.
    ///
    /// Absent or empty groups, or no identifier at all, never deny. A disabled
    /// resolver never denies either.
    pub async fn should_deny_package(
        &self,
        caller_app: Option<&str>,
        caller_sdk: Option<&str>,
        api_groups: Option<&HashSet<String>>,
    ) -> bool {
        if !self.cfg.enabled {
            tracing::error!(
                app = ?caller_app,
                sdk = ?caller_sdk,
                "package deny lookup while the service is disabled"
            );
            self.record(PackageDenyProcessStatus::Disabled);
            return false;
        }

        let Some(api_groups) = api_groups.filter(|g| !g.is_empty()) else {
            return false;
        };
        if caller_app.is_none() && caller_sdk.is_none() {
            return false;
        }

        let denied = self.snapshot().denies(caller_app, caller_sdk, api_groups);
        let result = if denied { "deny" } else { "allow" };
        self.metrics.deny_decisions.inc(&[("result", result)]);
        denied
    }

    /// Fetch, decode, filter and install the latest deny data.
    ///
    /// Overlapping calls run one after the other.
    pub async fn load_deny_data(&self) -> PackageDenyProcessStatus {
        if !self.cfg.enabled {
            tracing::debug!("package deny service disabled, skipping refresh");
            self.record(PackageDenyProcessStatus::Disabled);
            return PackageDenyProcessStatus::Disabled;
        }

        let _serialized = self.refresh_lock.lock().await;
        let started = Instant::now();
        let status = match self.refresh().await {
            Ok(()) => PackageDenyProcessStatus::Success,
            Err(status) => status,
        };
        self.metrics
            .deny_refresh_duration
            .observe(&[("status", status.as_str())], started.elapsed());
        self.record(status);
        status
    }

    async fn refresh(&self) -> std::result::Result<(), PackageDenyProcessStatus> {
        let file = self.deny_file().await?;

        let map = self.read_file(&file).await.map_err(|e| {
            tracing::error!(file = %file.file_uri, error = %e, "reading deny file failed");
            PackageDenyProcessStatus::FailedReadingFile
        })?;

        let cache = self.convert(&map).await.map_err(|e| {
            tracing::error!(error = %e, "filtering installed packages failed");
            PackageDenyProcessStatus::FailedFilteringInstalledPackages
        })?;

        self.sources.store.store(&cache).await.map_err(|e| {
            tracing::error!(error = %e, "persisting deny cache failed");
            PackageDenyProcessStatus::FailedUpdatingCache
        })?;

        tracing::info!(
            apps = cache.app_count(),
            sdks = cache.sdk_count(),
            "package deny cache updated"
        );
        self.swap(cache);
        Ok(())
    }

    async fn deny_file(&self) -> std::result::Result<ClientFile, PackageDenyProcessStatus> {
        let group = match self.sources.files.file_group(&self.cfg.file_group).await {
            Ok(Some(g)) => g,
            Ok(None) => {
                tracing::debug!(group = %self.cfg.file_group, "deny file group not downloaded yet");
                return Err(PackageDenyProcessStatus::NoFileFound);
            }
            Err(e) => {
                tracing::error!(
                    group = %self.cfg.file_group,
                    error = %e,
                    "file group lookup failed"
                );
                return Err(PackageDenyProcessStatus::FailedUpdatingCache);
            }
        };

        let ClientFileGroup { group_name, files } = group;
        files
            .into_iter()
            .find(|f| f.file_id.ends_with(".pb"))
            .ok_or_else(|| {
                tracing::debug!(group = %group_name, "file group has no .pb deny file");
                PackageDenyProcessStatus::NoFileFound
            })
    }

    async fn read_file(&self, file: &ClientFile) -> Result<PackageToApiDenyGroupsMap> {
        let raw = self.sources.storage.read(&file.file_uri).await?;
        decode_deny_data(raw)
    }

    async fn convert(&self, map: &PackageToApiDenyGroupsMap) -> Result<DenyGroupCache> {
        if !self.cfg.installed_package_filter {
            return Ok(DenyGroupCache::from_deny_map(map));
        }

        let mut installed: HashMap<String, u64> = HashMap::new();
        for pkg in self.sources.installed.installed_packages().await? {
            let version = installed.entry(pkg.name).or_insert(0);
            if *version == 0 {
                *version = pkg.version_code;
            }
        }
        Ok(DenyGroupCache::from_installed(map, &installed))
    }

    /// Load the persisted cache copy. On failure the in-memory cache is left empty.
    pub async fn restore_from_store(&self) -> PackageDenyProcessStatus {
        match self.sources.store.load().await {
            Ok(Some(cache)) => {
                tracing::info!(
                    apps = cache.app_count(),
                    sdks = cache.sdk_count(),
                    "restored package deny cache"
                );
                self.swap(cache);
                PackageDenyProcessStatus::Success
            }
            Ok(None) => PackageDenyProcessStatus::Success,
            Err(e) => {
                tracing::error!(error = %e, "reading persisted deny cache failed");
                self.record(PackageDenyProcessStatus::FailedReadingCache);
                PackageDenyProcessStatus::FailedReadingCache
            }
        }
    }

    fn record(&self, status: PackageDenyProcessStatus) {
        self.metrics
            .deny_process_status
            .inc(&[("status", status.as_str())]);
        if status != PackageDenyProcessStatus::Success {
            tracing::error!(
                status = %status,
                error_code = status.error_code(),
                "package deny process error"
            );
        }
    }

    /// Run [`Self::load_deny_data`] on its own task. A panic in a
    /// collaborator is reported as `Failure` instead of unwinding the caller.
    pub async fn load_deny_data_isolated(self: &Arc<Self>) -> PackageDenyProcessStatus {
        let resolver = Arc::clone(self);
        match tokio::spawn(async move { resolver.load_deny_data().await }).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(error = %e, "deny refresh aborted");
                self.record(PackageDenyProcessStatus::Failure);
                PackageDenyProcessStatus::Failure
            }
        }
    }

    /// Refresh immediately and then every `interval` on the tokio runtime.
    pub fn spawn_refresh_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = resolver.load_deny_data_isolated().await;
                tracing::debug!(status = %status, "scheduled deny refresh finished");
            }
        })
    }
}
