//! adpolicy: package-deny resolution and ad tech authorization.
//!
//! Depend on this crate to get both halves:
//! - [`core`]: error/status surface, deny-data codec, manifest config parser
//! - [`service`]: config, deny resolver, manifest helper, filter chain, throttler
//!
//! The [`prelude`] pulls in the types most embedders wire together.

pub mod core {
    pub use adpolicy_core::*;
}

pub mod service {
    pub use adpolicy_service::*;
}

pub mod prelude {
    pub use adpolicy_core::manifest::{parse_config, AccessResult, ApiSurface, AppManifestConfig};
    pub use adpolicy_core::{AdPolicyError, Result, StatusCode};

    pub use adpolicy_service::app_state::{AppState, FilterCollaborators};
    pub use adpolicy_service::config::PolicyConfig;
    pub use adpolicy_service::deny::{DenySources, PackageDenyProcessStatus, PackageDenyResolver};
    pub use adpolicy_service::filter::{
        AdSelectionServiceFilter, AdTechIdentifier, AuthorizationResult,
        CustomAudienceServiceFilter, DevContext, FilterRejection, FilterRequest, FilterSettings,
    };
    pub use adpolicy_service::manifest::{ManifestHelper, ManifestSource};
    pub use adpolicy_service::throttle::{ApiKey, Throttler};
}
