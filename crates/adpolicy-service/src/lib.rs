//! adpolicy service library entry.
//!
//! This crate wires the package-deny resolver, the manifest helper, the
//! authorization filter chain and the throttler into one runtime. It is
//! consumed by the binary (`main.rs`) and by integration tests. Platform
//! facilities (file download, package lookup, consent storage, process
//! importance) are injected as traits so every policy path can be driven
//! from tests.

pub mod app_state;
pub mod config;
pub mod deny;
pub mod filter;
pub mod manifest;
pub mod obs;
pub mod ops;
pub mod router;
pub mod throttle;
