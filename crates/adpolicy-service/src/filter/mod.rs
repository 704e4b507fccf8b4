//! Authorization filter chain for protected-audience style APIs.
//!
//! Each filter checks one concern and reports its rejection through the
//! API call stats logger before returning it. [`AdSelectionServiceFilter`]
//! and [`CustomAudienceServiceFilter`] run them in a fixed order and stop at
//! the first rejection.

pub mod allowlist;
pub mod authorization;
pub mod consent;
pub mod custom_audience_filter;
pub mod importance;
pub mod service_filter;
pub mod throttle;
pub mod types;

pub use allowlist::{AllowList, AllowListsFilter};
pub use authorization::AuthorizationFilter;
pub use consent::ConsentFilter;
pub use custom_audience_filter::CustomAudienceServiceFilter;
pub use importance::{AppImportanceFilter, IMPORTANCE_FOREGROUND_SERVICE};
pub use service_filter::{AdSelectionServiceFilter, FilterRequest, FilterSettings, FledgeFilters};
pub use throttle::ApiThrottleFilter;
pub use types::{
    AdTechIdentifier, AuthorizationResult, ConsentStore, DevContext, EnrollmentData,
    EnrollmentStore, FilterRejection, FledgeApiType, PackageIdentity, ProcessInfo,
    RunningProcesses,
};
