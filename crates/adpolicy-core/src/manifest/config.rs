use std::collections::BTreeSet;

/// API surfaces an app manifest can grant access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiSurface {
    Attribution,
    CustomAudiences,
    ProtectedSignals,
    AdSelection,
    Topics,
    AdId,
    AppSetId,
}

impl ApiSurface {
    pub const ALL: [ApiSurface; 7] = [
        ApiSurface::Attribution,
        ApiSurface::CustomAudiences,
        ApiSurface::ProtectedSignals,
        ApiSurface::AdSelection,
        ApiSurface::Topics,
        ApiSurface::AdId,
        ApiSurface::AppSetId,
    ];

    /// Canonical tag name.
    pub fn tag(self) -> &'static str {
        match self {
            ApiSurface::Attribution => "attribution",
            ApiSurface::CustomAudiences => "custom-audiences",
            ApiSurface::ProtectedSignals => "protected-signals",
            ApiSurface::AdSelection => "ad-selection",
            ApiSurface::Topics => "topics",
            ApiSurface::AdId => "ad-id",
            ApiSurface::AppSetId => "app-set-id",
        }
    }

    /// Resolve a tag name (case-sensitive). `adid`/`appsetid` are accepted spellings.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "attribution" => Some(ApiSurface::Attribution),
            "custom-audiences" => Some(ApiSurface::CustomAudiences),
            "protected-signals" => Some(ApiSurface::ProtectedSignals),
            "ad-selection" => Some(ApiSurface::AdSelection),
            "topics" => Some(ApiSurface::Topics),
            "ad-id" | "adid" => Some(ApiSurface::AdId),
            "app-set-id" | "appsetid" => Some(ApiSurface::AppSetId),
            _ => None,
        }
    }
}

/// Outcome of a manifest access query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessResult {
    AllowedAppAllowsAll,
    AllowedAppAllowsSpecificId,
    AllowedByDefaultAppHasConfigWithoutApiSection,
    AllowedByDefaultAppDoesNotHaveConfig,
    DisallowedAppHasConfigWithoutApiSection,
    DisallowedAppDoesNotHaveConfig,
    DisallowedByApp,
    DisallowedAppConfigParsingError,
    DisallowedAppNotFound,
}

impl AccessResult {
    pub fn is_allowed(self) -> bool {
        matches!(
            self,
            AccessResult::AllowedAppAllowsAll
                | AccessResult::AllowedAppAllowsSpecificId
                | AccessResult::AllowedByDefaultAppHasConfigWithoutApiSection
                | AccessResult::AllowedByDefaultAppDoesNotHaveConfig
        )
    }
}

/// Access declaration for one API surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiAccessConfig {
    pub allow_all: bool,
    pub allow_ad_partners: BTreeSet<String>,
}

impl ApiAccessConfig {
    fn check(&self, enrollment_id: &str) -> AccessResult {
        if self.allow_all {
            AccessResult::AllowedAppAllowsAll
        } else if self.allow_ad_partners.contains(enrollment_id) {
            AccessResult::AllowedAppAllowsSpecificId
        } else {
            AccessResult::DisallowedByApp
        }
    }
}

/// SDK libraries the app declares it bundles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncludesSdkLibraryConfig {
    sdks: BTreeSet<String>,
    contains_by_default: bool,
}

impl IncludesSdkLibraryConfig {
    pub fn new(sdks: BTreeSet<String>, contains_by_default: bool) -> Self {
        Self { sdks, contains_by_default }
    }

    /// True if the SDK is listed, or nothing is listed and the default allows it.
    pub fn contains(&self, sdk: &str) -> bool {
        if self.sdks.is_empty() {
            return self.contains_by_default;
        }
        self.sdks.contains(sdk)
    }

    pub fn is_empty(&self) -> bool {
        self.sdks.is_empty()
    }
}

/// Parsed app manifest config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppManifestConfig {
    pub attribution: Option<ApiAccessConfig>,
    pub custom_audiences: Option<ApiAccessConfig>,
    pub protected_signals: Option<ApiAccessConfig>,
    pub ad_selection: Option<ApiAccessConfig>,
    pub topics: Option<ApiAccessConfig>,
    pub ad_id: Option<ApiAccessConfig>,
    pub app_set_id: Option<ApiAccessConfig>,
    pub includes_sdk_library: IncludesSdkLibraryConfig,
    pub enabled_by_default: bool,
}

impl AppManifestConfig {
    pub fn section(&self, surface: ApiSurface) -> Option<&ApiAccessConfig> {
        match surface {
            ApiSurface::Attribution => self.attribution.as_ref(),
            ApiSurface::CustomAudiences => self.custom_audiences.as_ref(),
            ApiSurface::ProtectedSignals => self.protected_signals.as_ref(),
            ApiSurface::AdSelection => self.ad_selection.as_ref(),
            ApiSurface::Topics => self.topics.as_ref(),
            ApiSurface::AdId => self.ad_id.as_ref(),
            ApiSurface::AppSetId => self.app_set_id.as_ref(),
        }
    }

    pub(crate) fn section_mut(&mut self, surface: ApiSurface) -> &mut Option<ApiAccessConfig> {
        match surface {
            ApiSurface::Attribution => &mut self.attribution,
            ApiSurface::CustomAudiences => &mut self.custom_audiences,
            ApiSurface::ProtectedSignals => &mut self.protected_signals,
            ApiSurface::AdSelection => &mut self.ad_selection,
            ApiSurface::Topics => &mut self.topics,
            ApiSurface::AdId => &mut self.ad_id,
            ApiSurface::AppSetId => &mut self.app_set_id,
        }
    }

    pub fn is_allowed_access(&self, surface: ApiSurface, enrollment_id: &str) -> AccessResult {
        match self.section(surface) {
            Some(cfg) => cfg.check(enrollment_id),
            None if self.enabled_by_default => {
                AccessResult::AllowedByDefaultAppHasConfigWithoutApiSection
            }
            None => AccessResult::DisallowedAppHasConfigWithoutApiSection,
        }
    }

    pub fn is_allowed_attribution_access(&self, enrollment_id: &str) -> AccessResult {
        self.is_allowed_access(ApiSurface::Attribution, enrollment_id)
    }

    pub fn is_allowed_custom_audiences_access(&self, enrollment_id: &str) -> AccessResult {
        self.is_allowed_access(ApiSurface::CustomAudiences, enrollment_id)
    }

    pub fn is_allowed_protected_signals_access(&self, enrollment_id: &str) -> AccessResult {
        self.is_allowed_access(ApiSurface::ProtectedSignals, enrollment_id)
    }

    pub fn is_allowed_ad_selection_access(&self, enrollment_id: &str) -> AccessResult {
        self.is_allowed_access(ApiSurface::AdSelection, enrollment_id)
    }

    pub fn is_allowed_topics_access(&self, enrollment_id: &str) -> AccessResult {
        self.is_allowed_access(ApiSurface::Topics, enrollment_id)
    }

    pub fn is_allowed_ad_id_access(&self, enrollment_id: &str) -> AccessResult {
        self.is_allowed_access(ApiSurface::AdId, enrollment_id)
    }

    pub fn is_allowed_app_set_id_access(&self, enrollment_id: &str) -> AccessResult {
        self.is_allowed_access(ApiSurface::AppSetId, enrollment_id)
    }
}
