//! Password container with automatic memory zeroing.
//!
//! # Security
//! - The password is stored in a `Zeroizing<String>`
//! - Memory is cleared when the credential goes out of scope
//! - `Debug` output never includes the password

use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Database password retrieved from the secrets store.
///
/// # Example
///
/// ```rust
/// use rdsprobe_core::security::Credential;
///
/// let credential = Credential::new("s3cret".to_string());
/// assert_eq!(credential.expose(), "s3cret");
/// assert!(!format!("{credential:?}").contains("s3cret"));
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credential {
    password: Zeroizing<String>,
}

impl Credential {
    /// Wraps a password in a zeroizing container.
    pub fn new(password: String) -> Self {
        Self {
            password: Zeroizing::new(password),
        }
    }

    /// Returns the password for handing to the connection builder.
    pub fn expose(&self) -> &str {
        &self.password
    }

    /// Checks for an empty secret without exposing it.
    pub fn is_empty(&self) -> bool {
        self.password.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("password", &super::REDACTED)
            .finish()
    }
}
