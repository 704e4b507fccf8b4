//! Wire formats consumed by the policy engine.
//!
//! - Deny data: the versioned binary file distributed to devices that lists,
//!   per package or SDK, the API groups to deny.
//!
//! Parsers are panic-free: malformed input is reported as `AdPolicyError`
//! instead of panicking or indexing raw buffers, so a corrupt download can
//! never take the service down.

pub mod deny_data;
