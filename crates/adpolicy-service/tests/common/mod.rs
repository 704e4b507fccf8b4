#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

//! Hand-written collaborator doubles shared by the integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use adpolicy_core::error::{AdPolicyError, Result};
use adpolicy_service::deny::{
    CacheStore, ClientFile, ClientFileGroup, DenyFileSource, DenyGroupCache, FileStorage,
    InstalledPackage, InstalledPackages,
};
use adpolicy_service::filter::{
    AdTechIdentifier, ConsentStore, EnrollmentData, EnrollmentStore, PackageIdentity, ProcessInfo,
    RunningProcesses,
};
use adpolicy_service::manifest::ManifestSource;
use adpolicy_service::obs::{ApiCallStats, ApiCallStatsLogger};

/// What the file source answers for the deny group.
#[derive(Clone)]
pub enum GroupAnswer {
    Missing,
    Files(Vec<ClientFile>),
    Fail,
    Panic,
}

pub struct FakeFileSource {
    pub answer: Mutex<GroupAnswer>,
}

impl FakeFileSource {
    pub fn new(answer: GroupAnswer) -> Self {
        Self { answer: Mutex::new(answer) }
    }

    pub fn set(&self, answer: GroupAnswer) {
        *self.answer.lock().unwrap() = answer;
    }
}

#[async_trait]
impl DenyFileSource for FakeFileSource {
    async fn file_group(&self, group_name: &str) -> Result<Option<ClientFileGroup>> {
        let answer = self.answer.lock().unwrap().clone();
        match answer {
            GroupAnswer::Missing => Ok(None),
            GroupAnswer::Files(files) => Ok(Some(ClientFileGroup {
                group_name: group_name.to_string(),
                files,
            })),
            GroupAnswer::Fail => Err(AdPolicyError::Internal("download manager down".into())),
            GroupAnswer::Panic => panic!("download manager crashed"),
        }
    }
}

/// In-memory files. Reads can be slowed down; the largest number of reads
/// seen in flight at once is kept in `max_in_flight`.
#[derive(Default)]
pub struct FakeStorage {
    pub files: Mutex<HashMap<String, Bytes>>,
    pub read_delay_ms: AtomicU64,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeStorage {
    pub fn put(&self, uri: &str, data: Bytes) {
        self.files.lock().unwrap().insert(uri.to_string(), data);
    }
}

#[async_trait]
impl FileStorage for FakeStorage {
    async fn read(&self, uri: &str) -> Result<Bytes> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.files
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or_else(|| AdPolicyError::Io(format!("cannot open {uri}")))
    }
}

pub struct FakeInstalled {
    pub packages: Mutex<Option<Vec<InstalledPackage>>>,
}

impl FakeInstalled {
    pub fn new(packages: &[(&str, u64)]) -> Self {
        Self {
            packages: Mutex::new(Some(
                packages
                    .iter()
                    .map(|(n, v)| InstalledPackage { name: n.to_string(), version_code: *v })
                    .collect(),
            )),
        }
    }

    pub fn failing() -> Self {
        Self { packages: Mutex::new(None) }
    }
}

#[async_trait]
impl InstalledPackages for FakeInstalled {
    async fn installed_packages(&self) -> Result<Vec<InstalledPackage>> {
        self.packages
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AdPolicyError::Internal("package manager failure".into()))
    }
}

#[derive(Default)]
pub struct FakeCacheStore {
    pub stored: Mutex<Option<DenyGroupCache>>,
    pub fail_store: AtomicBool,
    pub fail_load: AtomicBool,
}

#[async_trait]
impl CacheStore for FakeCacheStore {
    async fn load(&self) -> Result<Option<DenyGroupCache>> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(AdPolicyError::Io("data store corrupted".into()));
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn store(&self, cache: &DenyGroupCache) -> Result<()> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(AdPolicyError::Io("interrupted".into()));
        }
        *self.stored.lock().unwrap() = Some(cache.clone());
        Ok(())
    }
}

/// Records every API call stats entry.
#[derive(Default)]
pub struct RecordingLogger {
    pub calls: Mutex<Vec<ApiCallStats>>,
}

impl RecordingLogger {
    pub fn calls(&self) -> Vec<ApiCallStats> {
        self.calls.lock().unwrap().clone()
    }
}

impl ApiCallStatsLogger for RecordingLogger {
    fn log_api_call_stats(&self, stats: ApiCallStats) {
        self.calls.lock().unwrap().push(stats);
    }
}

/// uid -> packages.
#[derive(Default)]
pub struct FakeIdentity {
    pub uids: HashMap<u32, Vec<String>>,
}

impl FakeIdentity {
    pub fn with(uid: u32, package: &str) -> Self {
        let mut uids = HashMap::new();
        uids.insert(uid, vec![package.to_string()]);
        Self { uids }
    }
}

impl PackageIdentity for FakeIdentity {
    fn packages_for_uid(&self, uid: u32) -> Vec<String> {
        self.uids.get(&uid).cloned().unwrap_or_default()
    }
}

/// Host -> enrollment id, split by API family.
#[derive(Default)]
pub struct FakeEnrollment {
    pub fledge: HashMap<String, String>,
    pub pas: HashMap<String, String>,
}

impl EnrollmentStore for FakeEnrollment {
    fn fledge_enrollment(&self, ad_tech: &AdTechIdentifier) -> Option<EnrollmentData> {
        self.fledge
            .get(ad_tech.as_str())
            .map(|id| EnrollmentData { enrollment_id: id.clone() })
    }

    fn pas_enrollment(&self, ad_tech: &AdTechIdentifier) -> Option<EnrollmentData> {
        self.pas
            .get(ad_tech.as_str())
            .map(|id| EnrollmentData { enrollment_id: id.clone() })
    }
}

pub struct FakeConsent {
    pub given: AtomicBool,
    pub revoked_apps: Mutex<HashSet<String>>,
}

impl FakeConsent {
    pub fn given() -> Self {
        Self {
            given: AtomicBool::new(true),
            revoked_apps: Mutex::new(HashSet::new()),
        }
    }
}

impl ConsentStore for FakeConsent {
    fn fledge_consent_given(&self) -> bool {
        self.given.load(Ordering::SeqCst)
    }

    fn is_app_consent_revoked(&self, package: &str) -> bool {
        self.revoked_apps.lock().unwrap().contains(package)
    }
}

pub struct FakeProcesses {
    pub processes: Mutex<Vec<ProcessInfo>>,
}

impl FakeProcesses {
    pub fn single(uid: u32, package: &str, importance: i32) -> Self {
        Self {
            processes: Mutex::new(vec![ProcessInfo {
                uid,
                importance,
                packages: vec![package.to_string()],
            }]),
        }
    }
}

impl RunningProcesses for FakeProcesses {
    fn running_processes(&self) -> Result<Vec<ProcessInfo>> {
        Ok(self.processes.lock().unwrap().clone())
    }
}

/// package -> manifest answer.
#[derive(Default)]
pub struct FakeManifests {
    pub configs: HashMap<String, Option<String>>,
}

impl FakeManifests {
    pub fn with(package: &str, xml: Option<&str>) -> Self {
        let mut configs = HashMap::new();
        configs.insert(package.to_string(), xml.map(str::to_string));
        Self { configs }
    }
}

impl ManifestSource for FakeManifests {
    fn fetch(&self, package: &str) -> Result<Option<String>> {
        self.configs
            .get(package)
            .cloned()
            .ok_or_else(|| AdPolicyError::PackageNotFound(package.to_string()))
    }
}

pub fn groups(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn arc<T>(v: T) -> Arc<T> {
    Arc::new(v)
}
