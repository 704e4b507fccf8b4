use axum::http::Uri;
use thiserror::Error;

use adpolicy_core::error::Result;
use adpolicy_core::manifest::ApiSurface;
use adpolicy_core::StatusCode;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FilterRejection {
    #[error("caller package does not belong to the calling uid")]
    CallerMismatch,
    #[error("ad tech not allowed: {status}")]
    AdTechNotAllowed { status: StatusCode },
    #[error("app is not in the allowlist")]
    AppNotAllowlisted,
    #[error("user consent revoked")]
    ConsentRevoked,
    #[error("rate limit reached")]
    Throttled,
    #[error("caller is not in the foreground")]
    WrongForegroundState,
}

impl FilterRejection {
    /// Status code surfaced to the caller and recorded in call stats.
    pub fn status_code(&self) -> StatusCode {
        match self {
            FilterRejection::CallerMismatch => StatusCode::Unauthorized,
            FilterRejection::AdTechNotAllowed { status } => *status,
            FilterRejection::AppNotAllowlisted => StatusCode::CallerNotAllowed,
            FilterRejection::ConsentRevoked => StatusCode::UserConsentRevoked,
            FilterRejection::Throttled => StatusCode::RateLimitReached,
            FilterRejection::WrongForegroundState => StatusCode::BackgroundCaller,
        }
    }
}

pub type AuthorizationResult = std::result::Result<(), FilterRejection>;

/// Ad tech identified by its host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdTechIdentifier(String);

impl AdTechIdentifier {
    pub fn from_host(host: &str) -> Self {
        Self(host.trim().to_ascii_lowercase())
    }

    /// Ad tech owning an absolute URI, or `None` if the URI has no host.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let parsed: Uri = uri.trim().parse().ok()?;
        let host = parsed.host().filter(|h| !h.is_empty())?;
        Some(Self::from_host(host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Loopback host, with or without a port.
    pub fn is_localhost(&self) -> bool {
        let host = self.0.as_str();
        let host = match host.strip_prefix('[') {
            Some(rest) => rest.split_once(']').map_or(rest, |(h, _)| h),
            None => host
                .rsplit_once(':')
                .filter(|(_, port)| port.bytes().all(|b| b.is_ascii_digit()))
                .map_or(host, |(h, _)| h),
        };
        matches!(host, "localhost" | "127.0.0.1" | "::1")
    }
}

impl std::fmt::Display for AdTechIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Developer-options state of the calling app.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DevContext {
    pub dev_options_enabled: bool,
    pub calling_app_package: String,
}

impl DevContext {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(calling_app_package: &str) -> Self {
        Self {
            dev_options_enabled: true,
            calling_app_package: calling_app_package.to_string(),
        }
    }

    /// Developer options let `package` reach a loopback ad tech without an
    /// enrollment. The context must belong to the calling package.
    pub fn allows_unenrolled(&self, package: &str, ad_tech: &AdTechIdentifier) -> bool {
        self.dev_options_enabled && self.calling_app_package == package && ad_tech.is_localhost()
    }
}

/// API family whose enrollment and manifest section apply to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FledgeApiType {
    CustomAudiences,
    ProtectedSignals,
    AdSelection,
}

impl FledgeApiType {
    pub fn surface(self) -> ApiSurface {
        match self {
            FledgeApiType::CustomAudiences => ApiSurface::CustomAudiences,
            FledgeApiType::ProtectedSignals => ApiSurface::ProtectedSignals,
            FledgeApiType::AdSelection => ApiSurface::AdSelection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentData {
    pub enrollment_id: String,
}

/// Enrollment lookups by ad tech.
pub trait EnrollmentStore: Send + Sync {
    fn fledge_enrollment(&self, ad_tech: &AdTechIdentifier) -> Option<EnrollmentData>;
    fn pas_enrollment(&self, ad_tech: &AdTechIdentifier) -> Option<EnrollmentData>;
}

/// Which packages run under a uid.
pub trait PackageIdentity: Send + Sync {
    fn packages_for_uid(&self, uid: u32) -> Vec<String>;
}

pub trait ConsentStore: Send + Sync {
    /// User-level consent for the API family.
    fn fledge_consent_given(&self) -> bool;
    /// Per-app revocation, independent of user-level consent.
    fn is_app_consent_revoked(&self, package: &str) -> bool;
}

/// A running process; lower importance means closer to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub uid: u32,
    pub importance: i32,
    pub packages: Vec<String>,
}

pub trait RunningProcesses: Send + Sync {
    fn running_processes(&self) -> Result<Vec<ProcessInfo>>;
}
