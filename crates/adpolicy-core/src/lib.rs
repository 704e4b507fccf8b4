//! adpolicy core: deny-data codec, app manifest config parser, and the
//! error/status surface shared with the service crate.
//!
//! Nothing here touches the filesystem or a runtime; callers hand in bytes
//! or XML text and get typed values back. Tooling that only needs to build
//! deny files or lint manifest configs can depend on this crate alone.
//!
//! Malformed input from a download or an app package must come back as an
//! `AdPolicyError`, never a panic, so the clippy panic lints are denied.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod manifest;
pub mod protocol;

pub use error::{AdPolicyError, Result, StatusCode};
