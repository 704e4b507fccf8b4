use std::collections::BTreeMap;

use serde::Deserialize;
use adpolicy_core::error::{AdPolicyError, Result};

use crate::throttle::ApiKey;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub version: u32,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub package_deny: PackageDenySection,

    #[serde(default)]
    pub manifest: ManifestSection,

    #[serde(default)]
    pub fledge: FledgeSection,

    #[serde(default)]
    pub throttle: ThrottleSection,
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(AdPolicyError::UnsupportedVersion);
        }

        self.service.validate()?;
        self.package_deny.validate()?;
        self.fledge.validate()?;
        self.throttle.validate()?;

        Ok(())
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            version: 1,
            service: ServiceSection::default(),
            package_deny: PackageDenySection::default(),
            manifest: ManifestSection::default(),
            fledge: FledgeSection::default(),
            throttle: ThrottleSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Period of the background deny-data refresh.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Persisted copy of the deny cache; in-memory only when absent.
    #[serde(default)]
    pub cache_path: Option<String>,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            refresh_interval_secs: default_refresh_interval_secs(),
            cache_path: None,
        }
    }
}

impl ServiceSection {
    pub fn validate(&self) -> Result<()> {
        if !(60..=86_400).contains(&self.refresh_interval_secs) {
            return Err(AdPolicyError::BadRequest(
                "service.refresh_interval_secs must be between 60 and 86400".into(),
            ));
        }
        if let Some(p) = &self.cache_path {
            if p.trim().is_empty() {
                return Err(AdPolicyError::BadRequest(
                    "service.cache_path must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "127.0.0.1:9090".into()
}
fn default_refresh_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDenySection {
    /// Kill switch for the whole deny service.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Keep only entries for installed packages whose version is in range.
    #[serde(default)]
    pub installed_package_filter: bool,

    #[serde(default = "default_file_group")]
    pub file_group: String,

    /// Directory holding one sub-directory per file group.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// JSON map `package -> version code` used by the installed-package filter.
    #[serde(default)]
    pub installed_packages_path: Option<String>,
}

impl Default for PackageDenySection {
    fn default() -> Self {
        Self {
            enabled: true,
            installed_package_filter: false,
            file_group: default_file_group(),
            data_dir: default_data_dir(),
            installed_packages_path: None,
        }
    }
}

impl PackageDenySection {
    pub fn validate(&self) -> Result<()> {
        if self.file_group.trim().is_empty() {
            return Err(AdPolicyError::BadRequest(
                "package_deny.file_group must not be empty".into(),
            ));
        }
        if self.file_group.contains(['/', '\\']) {
            return Err(AdPolicyError::BadRequest(
                "package_deny.file_group must be a plain name".into(),
            ));
        }
        if self.installed_package_filter && self.installed_packages_path.is_none() {
            return Err(AdPolicyError::BadRequest(
                "package_deny.installed_packages_path is required \
                 when installed_package_filter is on"
                    .into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_file_group() -> String {
    "package-deny".into()
}
fn default_data_dir() -> String {
    "data".into()
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ManifestSection {
    /// What a missing config or API section means.
    #[serde(default)]
    pub enabled_by_default: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FledgeSection {
    #[serde(default)]
    pub disable_enrollment_check: bool,

    #[serde(default = "default_true")]
    pub enforce_foreground: bool,

    /// Highest process importance still counted as foreground.
    #[serde(default = "default_foreground_importance_cutoff")]
    pub foreground_importance_cutoff: i32,

    /// `*` or a comma separated package list.
    #[serde(default = "default_app_allow_list")]
    pub app_allow_list: String,

    /// Allowlist for protected signals; falls back to `app_allow_list`.
    #[serde(default)]
    pub pas_app_allow_list: Option<String>,

    /// Enrollment ids that are never allowed.
    #[serde(default)]
    pub ad_tech_block_list: Vec<String>,

    #[serde(default = "default_true")]
    pub enforce_consent: bool,
}

impl Default for FledgeSection {
    fn default() -> Self {
        Self {
            disable_enrollment_check: false,
            enforce_foreground: true,
            foreground_importance_cutoff: default_foreground_importance_cutoff(),
            app_allow_list: default_app_allow_list(),
            pas_app_allow_list: None,
            ad_tech_block_list: Vec::new(),
            enforce_consent: true,
        }
    }
}

impl FledgeSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=1000).contains(&self.foreground_importance_cutoff) {
            return Err(AdPolicyError::BadRequest(
                "fledge.foreground_importance_cutoff must be between 100 and 1000".into(),
            ));
        }
        if self.ad_tech_block_list.iter().any(|e| e.trim().is_empty()) {
            return Err(AdPolicyError::BadRequest(
                "fledge.ad_tech_block_list must not contain empty entries".into(),
            ));
        }
        Ok(())
    }

    pub fn pas_allow_list(&self) -> &str {
        self.pas_app_allow_list.as_deref().unwrap_or(&self.app_allow_list)
    }
}

fn default_foreground_importance_cutoff() -> i32 {
    125
}
fn default_app_allow_list() -> String {
    "*".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleSection {
    /// Permits per second for keys without an override. Negative disables limiting.
    #[serde(default = "default_permits_per_second")]
    pub default_permits_per_second: f64,

    /// Overrides keyed by API key name, e.g. `MEASUREMENT_API_REGISTER_SOURCE`.
    #[serde(default)]
    pub per_api: BTreeMap<String, f64>,
}

impl Default for ThrottleSection {
    fn default() -> Self {
        Self {
            default_permits_per_second: default_permits_per_second(),
            per_api: BTreeMap::new(),
        }
    }
}

impl ThrottleSection {
    pub fn validate(&self) -> Result<()> {
        check_permits("throttle.default_permits_per_second", self.default_permits_per_second)?;
        for (name, permits) in &self.per_api {
            if ApiKey::from_name(name).is_none() {
                return Err(AdPolicyError::BadRequest(format!(
                    "throttle.per_api: unknown api key {name}"
                )));
            }
            check_permits(&format!("throttle.per_api.{name}"), *permits)?;
        }
        Ok(())
    }

    /// Effective permits per second for a key.
    pub fn permits_for(&self, key: ApiKey) -> f64 {
        self.per_api
            .get(key.as_str())
            .copied()
            .unwrap_or(self.default_permits_per_second)
    }
}

fn check_permits(field: &str, permits: f64) -> Result<()> {
    if !permits.is_finite() || permits == 0.0 {
        return Err(AdPolicyError::BadRequest(format!(
            "{field} must be a non-zero number (negative disables throttling)"
        )));
    }
    Ok(())
}

fn default_permits_per_second() -> f64 {
    1.0
}
