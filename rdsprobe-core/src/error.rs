//! Error types with credential sanitization.
//!
//! Every error that can end a run maps to one `ProbeError` variant. Messages
//! never carry the password or the unredacted connection string; driver and
//! I/O failures are kept as boxed sources for `-v` diagnostics.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for rdsprobe operations.
///
/// # Security
/// All error messages are sanitized to prevent credential leakage.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A required driver or client library is not available in this build
    #[error("Required dependency missing: {dependency}")]
    MissingDependency { dependency: String },

    /// Password could not be retrieved from the secrets store
    #[error("Error retrieving password: {context}")]
    Credential { context: String },

    /// Every endpoint source was exhausted
    #[error("Could not resolve SQL Server endpoint: {message}")]
    EndpointResolution {
        message: String,
        /// `SQL_SERVER_HOST` was unset; false when it was set but unusable
        host_missing: bool,
    },

    /// Local endpoint configuration file is unreadable or malformed
    #[error("Error reading config file {}: {context}", path.display())]
    ConfigFile { path: PathBuf, context: String },

    /// An external command failed in a step that has a fallback
    #[error("Error running `{command}`: {context}")]
    ExternalCommand { command: String, context: String },

    /// Driver failure during connect or query (credentials sanitized)
    #[error("{context}: {source}")]
    Database {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration or setup error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results with `ProbeError`
pub type Result<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    /// Creates a missing dependency error
    pub fn missing_dependency(dependency: impl Into<String>) -> Self {
        Self::MissingDependency {
            dependency: dependency.into(),
        }
    }

    /// Creates a credential retrieval error
    pub fn credential(context: impl Into<String>) -> Self {
        Self::Credential {
            context: context.into(),
        }
    }

    /// Creates an endpoint resolution error
    pub fn endpoint_resolution(message: impl Into<String>, host_missing: bool) -> Self {
        Self::EndpointResolution {
            message: message.into(),
            host_missing,
        }
    }

    /// Creates a config file error
    pub fn config_file(path: impl Into<PathBuf>, context: impl Into<String>) -> Self {
        Self::ConfigFile {
            path: path.into(),
            context: context.into(),
        }
    }

    /// Creates an external command error
    pub fn external_command(command: impl Into<String>, context: impl Into<String>) -> Self {
        Self::ExternalCommand {
            command: command.into(),
            context: context.into(),
        }
    }

    /// Creates a database error with context
    pub fn database<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Database {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a database error for a connect attempt that exceeded its timeout
    pub fn connect_timeout(timeout: Duration) -> Self {
        Self::database(
            "Database connection error",
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no response within {}s", timeout.as_secs()),
            ),
        )
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns true for driver-level failures
    pub const fn is_database(&self) -> bool {
        matches!(self, Self::Database { .. })
    }

    /// Remediation hints printed after the error message.
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::MissingDependency { .. } => &[
                "This build does not include the SQL Server driver.",
                "Rebuild with: cargo build --features mssql",
            ],
            Self::Credential { .. } => &[
                "Make sure the AWS CLI is installed and configured (aws configure).",
                "Check that the secret exists in the selected region.",
            ],
            Self::EndpointResolution {
                host_missing: true,
                ..
            } => &[
                "SQL_SERVER_HOST not set. Please set this environment variable.",
                "For example: export SQL_SERVER_HOST=your-server.region.rds.amazonaws.com",
            ],
            Self::EndpointResolution {
                host_missing: false,
                ..
            } => &[
                "SQL_SERVER_PORT must be a TCP port number.",
                "For example: export SQL_SERVER_PORT=1433",
            ],
            Self::Database { .. } => &[
                "Make sure the RDS instance is running and accessible.",
                "Check security groups to ensure your IP has access.",
            ],
            Self::ConfigFile { .. }
            | Self::ExternalCommand { .. }
            | Self::Configuration { .. }
            | Self::Io { .. } => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = ProbeError::configuration("bad verbosity");
        assert!(error.to_string().contains("bad verbosity"));

        let error = ProbeError::credential("secret not found");
        assert_eq!(
            error.to_string(),
            "Error retrieving password: secret not found"
        );
    }

    #[test]
    fn test_config_file_error_names_path() {
        let error = ProbeError::config_file("sql_config.json", "expected value at line 1");
        let message = error.to_string();
        assert!(message.contains("sql_config.json"));
        assert!(message.contains("expected value"));
    }

    #[test]
    fn test_connect_timeout_is_database_error() {
        let error = ProbeError::connect_timeout(Duration::from_secs(30));
        assert!(error.is_database());
        assert!(error.to_string().contains("30s"));
    }

    #[test]
    fn test_remediation_per_category() {
        let database = ProbeError::database(
            "Database connection error",
            std::io::Error::other("refused"),
        );
        assert!(
            database
                .remediation()
                .iter()
                .any(|hint| hint.contains("security groups"))
        );

        let endpoint = ProbeError::endpoint_resolution("no source produced a host", true);
        assert!(
            endpoint
                .remediation()
                .iter()
                .any(|hint| hint.contains("export SQL_SERVER_HOST="))
        );

        let bad_port = ProbeError::endpoint_resolution("SQL_SERVER_PORT=\"14x3\"", false);
        let hints = bad_port.remediation();
        assert!(hints.iter().all(|hint| !hint.contains("SQL_SERVER_HOST")));
        assert!(hints.iter().any(|hint| hint.contains("SQL_SERVER_PORT")));

        let config = ProbeError::config_file("x.json", "bad");
        assert!(config.remediation().is_empty());
    }
}
