//! Run configuration.
//!
//! `RunConfig` is assembled once by the CLI layer from flags and
//! environment variables and is read-only afterwards.

use std::path::PathBuf;
use std::time::Duration;

/// AWS region used when neither `--region` nor `AWS_REGION` is set
pub const DEFAULT_REGION: &str = "us-east-2";
/// Login used when neither `--username` nor `SQL_SERVER_USERNAME` is set
pub const DEFAULT_USERNAME: &str = "admin";
/// SQL Server's standard TCP port
pub const DEFAULT_SQL_PORT: u16 = 1433;
/// Directory holding the Pulumi project
pub const DEFAULT_PULUMI_DIR: &str = "./sql-server-pulumi";
/// Local JSON file consulted when Pulumi is unavailable
pub const DEFAULT_CONFIG_FILE: &str = "sql_config.json";
/// Secrets Manager identifier of the admin password
pub const DEFAULT_SECRET_ID: &str = "rds/sqlserver-database-1/password";
/// Pulumi stack output carrying `host[:port]`
pub const DEFAULT_STACK_OUTPUT: &str = "sqlServerEndpoint";
/// Database restored by the upload-and-restore script
pub const DEFAULT_TARGET_DATABASE: &str = "AdventureWorksLT";
/// Value of the `DRIVER=` clause
pub const DEFAULT_DRIVER: &str = "ODBC Driver 17 for SQL Server";
/// Database every probe starts in
pub const MASTER_DATABASE: &str = "master";
/// Connect timeout applied to each session
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the fallback host
pub const ENV_SQL_SERVER_HOST: &str = "SQL_SERVER_HOST";
/// Environment variable holding the fallback port
pub const ENV_SQL_SERVER_PORT: &str = "SQL_SERVER_PORT";

/// Host and port taken from the environment, used as the last endpoint source.
///
/// Values are captured verbatim; the port is parsed only if this source is
/// actually reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFallback {
    /// `SQL_SERVER_HOST`, `None` when unset or empty
    pub host: Option<String>,
    /// `SQL_SERVER_PORT`, `None` when unset
    pub port: Option<String>,
}

impl EnvFallback {
    /// Captures the fallback pair from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Captures the fallback pair through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup(ENV_SQL_SERVER_HOST).filter(|host| !host.trim().is_empty()),
            port: lookup(ENV_SQL_SERVER_PORT),
        }
    }
}

/// Everything a single probe run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// AWS region for the secrets lookup
    pub region: String,
    /// Explicit server override
    pub server: Option<String>,
    /// Explicit port override
    pub port: Option<u16>,
    /// SQL login name
    pub username: String,
    /// Working directory for the Pulumi invocation
    pub pulumi_dir: PathBuf,
    /// Local endpoint config file
    pub config_file: PathBuf,
    /// Secrets Manager identifier
    pub secret_id: String,
    /// Pulumi stack output name
    pub stack_output: String,
    /// Database whose restore status and tables are reported
    pub target_database: String,
    /// `DRIVER=` value of the connection string
    pub driver: String,
    /// Timeout for establishing each session
    pub connect_timeout: Duration,
    /// Accept the server certificate without validation
    pub trust_server_certificate: bool,
    /// Last-resort endpoint values from the environment
    pub env_fallback: EnvFallback,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            server: None,
            port: None,
            username: DEFAULT_USERNAME.to_string(),
            pulumi_dir: PathBuf::from(DEFAULT_PULUMI_DIR),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            secret_id: DEFAULT_SECRET_ID.to_string(),
            stack_output: DEFAULT_STACK_OUTPUT.to_string(),
            target_database: DEFAULT_TARGET_DATABASE.to_string(),
            driver: DEFAULT_DRIVER.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            trust_server_certificate: true,
            env_fallback: EnvFallback::default(),
        }
    }
}
