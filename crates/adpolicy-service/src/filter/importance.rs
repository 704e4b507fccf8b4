//! Foreground checks based on process importance.

use std::sync::Arc;

use crate::obs::{ApiCallStats, ApiCallStatsLogger};

use super::types::{AuthorizationResult, FilterRejection, ProcessInfo, RunningProcesses};

pub const IMPORTANCE_FOREGROUND: i32 = 100;
pub const IMPORTANCE_FOREGROUND_SERVICE: i32 = 125;
pub const IMPORTANCE_VISIBLE: i32 = 200;
pub const IMPORTANCE_GONE: i32 = 1000;

/// Package name reported when the caller's process cannot be found.
pub const UNKNOWN_APP_PACKAGE_NAME: &str = "unknown";

pub struct AppImportanceFilter {
    processes: Arc<dyn RunningProcesses>,
    importance_cutoff: i32,
    logger: Arc<dyn ApiCallStatsLogger>,
}

impl AppImportanceFilter {
    pub fn new(
        processes: Arc<dyn RunningProcesses>,
        importance_cutoff: i32,
        logger: Arc<dyn ApiCallStatsLogger>,
    ) -> Self {
        Self {
            processes,
            importance_cutoff,
            logger,
        }
    }

    /// Some process running as `uid` must be at or above the cutoff importance.
    pub fn assert_caller_is_in_foreground(
        &self,
        uid: u32,
        api: i32,
        sdk: Option<&str>,
    ) -> AuthorizationResult {
        let processes = match self.processes.running_processes() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(uid, error = %e, "unable to read running processes");
                return self.reject(api, UNKNOWN_APP_PACKAGE_NAME, sdk);
            }
        };

        let owned: Vec<&ProcessInfo> = processes.iter().filter(|p| p.uid == uid).collect();
        if owned.iter().any(|p| p.importance <= self.importance_cutoff) {
            return Ok(());
        }

        let package = owned
            .iter()
            .find_map(|p| p.packages.first())
            .map(String::as_str)
            .unwrap_or(UNKNOWN_APP_PACKAGE_NAME);
        tracing::debug!(uid, package = %package, "caller uid is not in the foreground");
        self.reject(api, package, sdk)
    }

    /// Same check, keyed by package instead of uid.
    pub fn assert_package_is_in_foreground(
        &self,
        package: &str,
        api: i32,
        sdk: Option<&str>,
    ) -> AuthorizationResult {
        let processes = match self.processes.running_processes() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(package = %package, error = %e, "unable to read running processes");
                return self.reject(api, package, sdk);
            }
        };

        let in_foreground = processes
            .iter()
            .filter(|p| p.packages.iter().any(|name| name == package))
            .any(|p| p.importance <= self.importance_cutoff);
        if in_foreground {
            return Ok(());
        }

        tracing::debug!(package = %package, "caller package is not in the foreground");
        self.reject(api, package, sdk)
    }

    fn reject(&self, api: i32, package: &str, sdk: Option<&str>) -> AuthorizationResult {
        let rejection = FilterRejection::WrongForegroundState;
        self.logger.log_api_call_stats(ApiCallStats::new(
            api,
            package,
            sdk.unwrap_or_default(),
            rejection.status_code(),
        ));
        Err(rejection)
    }
}
