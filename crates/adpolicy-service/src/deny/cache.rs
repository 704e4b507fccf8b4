use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use adpolicy_core::protocol::deny_data::{
    ApiDenyGroupsForPackage, PackageToApiDenyGroupsMap, PackageType,
};

/// Deny groups per app package and per SDK, ready for lookups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DenyGroupCache {
    #[serde(default)]
    apps: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    sdks: BTreeMap<String, BTreeSet<String>>,
}

impl DenyGroupCache {
    /// Flatten every version range of every entry.
    pub fn from_deny_map(map: &PackageToApiDenyGroupsMap) -> Self {
        let mut cache = Self::default();
        for (name, entry) in &map.entries {
            let groups = entry.versions.iter().flat_map(|v| v.api_groups.iter().cloned());
            cache.insert(name, entry, groups);
        }
        cache
    }

    /// Keep installed entries only, with the ranges that contain the
    /// installed version code.
    pub fn from_installed(
        map: &PackageToApiDenyGroupsMap,
        installed: &HashMap<String, u64>,
    ) -> Self {
        let mut cache = Self::default();
        for (name, entry) in &map.entries {
            let Some(&version) = installed.get(name) else {
                continue;
            };
            let groups = entry
                .versions
                .iter()
                .filter(|v| v.contains_version(version))
                .flat_map(|v| v.api_groups.iter().cloned());
            cache.insert(name, entry, groups);
        }
        cache
    }

    fn insert(
        &mut self,
        name: &str,
        entry: &ApiDenyGroupsForPackage,
        groups: impl IntoIterator<Item = String>,
    ) {
        match entry.package_type {
            PackageType::App => self.insert_app(name, groups),
            PackageType::Sdk => self.insert_sdk(name, groups),
            PackageType::Unknown => {
                tracing::debug!(package = %name, "skipping deny entry with unknown package type");
            }
        }
    }

    pub fn insert_app(&mut self, app: &str, groups: impl IntoIterator<Item = String>) {
        insert_non_empty(&mut self.apps, app, groups);
    }

    pub fn insert_sdk(&mut self, sdk: &str, groups: impl IntoIterator<Item = String>) {
        insert_non_empty(&mut self.sdks, sdk, groups);
    }

    pub fn app_groups(&self, app: &str) -> Option<&BTreeSet<String>> {
        self.apps.get(app)
    }

    pub fn sdk_groups(&self, sdk: &str) -> Option<&BTreeSet<String>> {
        self.sdks.get(sdk)
    }

    pub fn app_count(&self) -> usize {
        self.apps.len()
    }

    pub fn sdk_count(&self) -> usize {
        self.sdks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty() && self.sdks.is_empty()
    }

    /// True when `app` or `sdk` (non-blank) has a group in `api_groups`.
    pub fn denies(
        &self,
        app: Option<&str>,
        sdk: Option<&str>,
        api_groups: &HashSet<String>,
    ) -> bool {
        intersects(app.and_then(|a| lookup(&self.apps, a)), api_groups)
            || intersects(sdk.and_then(|s| lookup(&self.sdks, s)), api_groups)
    }
}

fn insert_non_empty(
    map: &mut BTreeMap<String, BTreeSet<String>>,
    key: &str,
    groups: impl IntoIterator<Item = String>,
) {
    let groups: BTreeSet<String> = groups.into_iter().collect();
    if groups.is_empty() {
        return;
    }
    map.entry(key.to_string()).or_default().extend(groups);
}

fn lookup<'a>(
    map: &'a BTreeMap<String, BTreeSet<String>>,
    key: &str,
) -> Option<&'a BTreeSet<String>> {
    if key.trim().is_empty() {
        return None;
    }
    map.get(key)
}

fn intersects(groups: Option<&BTreeSet<String>>, wanted: &HashSet<String>) -> bool {
    groups.is_some_and(|g| g.iter().any(|x| wanted.contains(x)))
}
