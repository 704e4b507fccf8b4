//! App allowlists.
//!
//! A list is either the wildcard `*` or a comma separated set of package
//! names matched exactly.

use std::collections::HashSet;
use std::sync::Arc;

use crate::obs::{ApiCallStats, ApiCallStatsLogger};

use super::types::{AuthorizationResult, FilterRejection, FledgeApiType};

/// Compiled allowlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    All,
    Only(HashSet<String>),
}

impl AllowList {
    pub fn compile(raw: &str) -> Self {
        if raw.trim() == "*" {
            return AllowList::All;
        }
        AllowList::Only(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_allowed(&self, package: &str) -> bool {
        match self {
            AllowList::All => true,
            AllowList::Only(set) => set.contains(package),
        }
    }
}

pub struct AllowListsFilter {
    app_allow_list: AllowList,
    pas_app_allow_list: AllowList,
    logger: Arc<dyn ApiCallStatsLogger>,
}

impl AllowListsFilter {
    pub fn new(
        app_allow_list: &str,
        pas_app_allow_list: &str,
        logger: Arc<dyn ApiCallStatsLogger>,
    ) -> Self {
        Self {
            app_allow_list: AllowList::compile(app_allow_list),
            pas_app_allow_list: AllowList::compile(pas_app_allow_list),
            logger,
        }
    }

    pub fn assert_app_in_allowlist(
        &self,
        package: &str,
        api: i32,
        api_type: FledgeApiType,
    ) -> AuthorizationResult {
        let list = match api_type {
            FledgeApiType::ProtectedSignals => &self.pas_app_allow_list,
            FledgeApiType::CustomAudiences | FledgeApiType::AdSelection => &self.app_allow_list,
        };
        if list.is_allowed(package) {
            return Ok(());
        }

        tracing::debug!(package = %package, ?api_type, "app not in allowlist");
        let rejection = FilterRejection::AppNotAllowlisted;
        self.logger
            .log_api_call_stats(ApiCallStats::new(api, package, "", rejection.status_code()));
        Err(rejection)
    }
}
