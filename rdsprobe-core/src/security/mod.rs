//! Credential protection utilities.
//!
//! - `credentials`: password container with automatic memory zeroing
//! - [`REDACTED`]: the mask rendered wherever a password would appear

mod credentials;

pub use credentials::Credential;

/// Mask used in place of a password in any rendered output
pub const REDACTED: &str = "****";
