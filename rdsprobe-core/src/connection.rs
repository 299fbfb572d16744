//! Connection-string assembly.
//!
//! [`ConnectionString`] holds the five `DRIVER`/`SERVER`/`DATABASE`/`UID`/`PWD`
//! fields. Its `Display` output masks the password; the full string is only
//! produced by [`ConnectionString::expose`].
//!
//! Delimiter characters (`;`, `{`, `}`) in the username or password are not
//! escaped. A password containing `;` yields a string other ODBC consumers
//! will split incorrectly.

use crate::security::REDACTED;
use std::fmt;
use zeroize::Zeroizing;

/// Fields of a SQL Server connection string.
#[derive(Clone)]
pub struct ConnectionString {
    driver: String,
    host: String,
    port: u16,
    database: String,
    username: String,
    password: Zeroizing<String>,
}

/// Assembles a connection string; no network access, no escaping.
///
/// # Example
/// ```rust
/// use rdsprobe_core::build_connection_string;
///
/// let conn = build_connection_string(
///     "ODBC Driver 17 for SQL Server", "myhost", 1433, "master", "admin", "p@ss",
/// );
/// assert!(conn.expose().contains("SERVER=myhost,1433;DATABASE=master;UID=admin;PWD=p@ss"));
/// assert!(!conn.to_string().contains("p@ss"));
/// ```
pub fn build_connection_string(
    driver: &str,
    host: &str,
    port: u16,
    database: &str,
    username: &str,
    password: &str,
) -> ConnectionString {
    ConnectionString {
        driver: driver.to_string(),
        host: host.to_string(),
        port,
        database: database.to_string(),
        username: username.to_string(),
        password: Zeroizing::new(password.to_string()),
    }
}

impl ConnectionString {
    /// Copy of this connection string targeting another database.
    #[must_use]
    pub fn with_database(&self, database: &str) -> Self {
        Self {
            database: database.to_string(),
            ..self.clone()
        }
    }

    /// Target database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Server host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Login name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password, for handing to the driver
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Full connection string including the password.
    pub fn expose(&self) -> Zeroizing<String> {
        Zeroizing::new(self.render(&self.password))
    }

    fn render(&self, password: &str) -> String {
        format!(
            "DRIVER={{{}}};SERVER={},{};DATABASE={};UID={};PWD={}",
            self.driver, self.host, self.port, self.database, self.username, password
        )
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(REDACTED))
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionString")
            .field(&self.render(REDACTED))
            .finish()
    }
}
