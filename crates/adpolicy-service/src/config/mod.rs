//! Service config loader (strict parsing).

pub mod schema;

use std::fs;

use adpolicy_core::error::{AdPolicyError, Result};

pub use schema::{
    FledgeSection, ManifestSection, PackageDenySection, PolicyConfig, ServiceSection,
    ThrottleSection,
};

pub fn load_from_file(path: &str) -> Result<PolicyConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| AdPolicyError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<PolicyConfig> {
    let cfg: PolicyConfig = serde_yaml::from_str(s)
        .map_err(|e| AdPolicyError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
