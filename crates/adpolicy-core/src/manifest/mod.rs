//! Per-app manifest config: which ad techs an app lets use each API surface.
//!
//! Apps embed a small XML block in their package; `parser` turns it into an
//! `AppManifestConfig` that answers `is_allowed_*_access(enrollment_id)`.

pub mod config;
pub mod parser;

pub use config::{
    AccessResult, ApiAccessConfig, ApiSurface, AppManifestConfig, IncludesSdkLibraryConfig,
};
pub use parser::parse_config;
