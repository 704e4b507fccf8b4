//! Shared error type across adpolicy crates.

use thiserror::Error;

/// Caller-facing status codes (stable API).
///
/// Numeric values are what API-call-stats records carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusCode {
    Success,
    /// Unexpected failure inside the service.
    InternalError,
    /// Invalid input / malformed data.
    InvalidArgument,
    /// Caller exceeded its request budget.
    RateLimitReached,
    /// Reading a file or store failed.
    IoError,
    /// User revoked consent for the API.
    UserConsentRevoked,
    /// Caller is not allowed to use the API.
    CallerNotAllowed,
    /// Caller was not in the foreground.
    BackgroundCaller,
    /// Caller identity does not match.
    Unauthorized,
    /// Ad tech enrollment is blocklisted.
    CallerNotAllowedEnrollmentBlocklisted,
    /// No enrollment matches the ad tech.
    CallerNotAllowedEnrollmentMatchNotFound,
    /// App manifest config does not grant the ad tech access.
    CallerNotAllowedManifestAdservicesConfigNoPermission,
}

impl StatusCode {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::InternalError => "INTERNAL_ERROR",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::RateLimitReached => "RATE_LIMIT_REACHED",
            StatusCode::IoError => "IO_ERROR",
            StatusCode::UserConsentRevoked => "USER_CONSENT_REVOKED",
            StatusCode::CallerNotAllowed => "CALLER_NOT_ALLOWED",
            StatusCode::BackgroundCaller => "BACKGROUND_CALLER",
            StatusCode::Unauthorized => "UNAUTHORIZED",
            StatusCode::CallerNotAllowedEnrollmentBlocklisted => {
                "CALLER_NOT_ALLOWED_ENROLLMENT_BLOCKLISTED"
            }
            StatusCode::CallerNotAllowedEnrollmentMatchNotFound => {
                "CALLER_NOT_ALLOWED_ENROLLMENT_MATCH_NOT_FOUND"
            }
            StatusCode::CallerNotAllowedManifestAdservicesConfigNoPermission => {
                "CALLER_NOT_ALLOWED_MANIFEST_ADSERVICES_CONFIG_NO_PERMISSION"
            }
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            StatusCode::Success => 0,
            StatusCode::InternalError => 1,
            StatusCode::InvalidArgument => 2,
            StatusCode::RateLimitReached => 3,
            StatusCode::IoError => 5,
            StatusCode::UserConsentRevoked => 7,
            StatusCode::CallerNotAllowed => 10,
            StatusCode::BackgroundCaller => 11,
            StatusCode::Unauthorized => 12,
            StatusCode::CallerNotAllowedEnrollmentBlocklisted => 21,
            StatusCode::CallerNotAllowedEnrollmentMatchNotFound => 22,
            StatusCode::CallerNotAllowedManifestAdservicesConfigNoPermission => 23,
        }
    }

    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, AdPolicyError>;

/// Unified error type used by core and service.
#[derive(Debug, Error)]
pub enum AdPolicyError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported data version")]
    UnsupportedVersion,
    /// Manifest config could not be parsed. The message is the bare reason.
    #[error("{0}")]
    ManifestParse(String),
    #[error("package not found: {0}")]
    PackageNotFound(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io: {0}")]
    Io(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AdPolicyError {
    /// Map internal error to a stable caller-facing code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdPolicyError::BadRequest(_) => StatusCode::InvalidArgument,
            AdPolicyError::UnsupportedVersion => StatusCode::InvalidArgument,
            AdPolicyError::ManifestParse(_) => StatusCode::InvalidArgument,
            AdPolicyError::PackageNotFound(_) => StatusCode::Unauthorized,
            AdPolicyError::NotFound(_) => StatusCode::InvalidArgument,
            AdPolicyError::Io(_) => StatusCode::IoError,
            AdPolicyError::Internal(_) => StatusCode::InternalError,
        }
    }
}

impl From<std::io::Error> for AdPolicyError {
    fn from(e: std::io::Error) -> Self {
        AdPolicyError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_keep_their_wire_values() {
        assert_eq!(StatusCode::Success.as_i32(), 0);
        assert!(StatusCode::Success.is_success());
        assert!(!StatusCode::RateLimitReached.is_success());
        assert_eq!(StatusCode::CallerNotAllowedEnrollmentMatchNotFound.as_i32(), 22);
        assert_eq!(
            AdPolicyError::ManifestParse("x".into()).status_code().as_str(),
            "INVALID_ARGUMENT"
        );
    }
}
