//! Command-line interface.

use clap::{Args, Parser};
use rdsprobe_core::config::{
    DEFAULT_CONFIG_FILE, DEFAULT_DRIVER, DEFAULT_PULUMI_DIR, DEFAULT_REGION, DEFAULT_SECRET_ID,
    DEFAULT_STACK_OUTPUT, DEFAULT_TARGET_DATABASE, DEFAULT_USERNAME,
};
use rdsprobe_core::{EnvFallback, RunConfig};
use std::path::PathBuf;
use std::time::Duration;

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "rdsprobe")]
#[command(about = "Test connection to SQL Server RDS")]
#[command(version)]
#[command(long_about = "
rdsprobe - SQL Server on RDS connectivity check

Retrieves the admin password from AWS Secrets Manager, finds the instance
endpoint, connects, and reports:
- Server version
- Restore task status for the target database
- Databases on the server
- Tables of the target database, if it exists

ENDPOINT SOURCES (first match wins):
1. --server and --port
2. pulumi stack output sqlServerEndpoint (run inside PULUMI_DIR)
3. JSON config file with server and port (SQL_CONFIG_FILE)
4. SQL_SERVER_HOST / SQL_SERVER_PORT

EXAMPLES:
  rdsprobe
  rdsprobe --region eu-west-1
  rdsprobe --server mydb.abc123.us-east-2.rds.amazonaws.com --port 1433
")]
pub struct Cli {
    /// Logging flags
    #[command(flatten)]
    pub global: GlobalArgs,

    /// AWS region for the secrets lookup
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// SQL Server hostname (overrides Pulumi output; requires --port)
    #[arg(long)]
    pub server: Option<String>,

    /// SQL Server port (overrides Pulumi output; requires --server)
    #[arg(long)]
    pub port: Option<u16>,

    /// SQL Server login
    #[arg(long, env = "SQL_SERVER_USERNAME", default_value = DEFAULT_USERNAME)]
    pub username: String,

    /// Directory of the Pulumi project
    #[arg(long, env = "PULUMI_DIR", default_value = DEFAULT_PULUMI_DIR)]
    pub pulumi_dir: PathBuf,

    /// JSON file with `server` and `port`, used when Pulumi is unavailable
    #[arg(long, env = "SQL_CONFIG_FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Secrets Manager identifier holding the password
    #[arg(long, default_value = DEFAULT_SECRET_ID)]
    pub secret_id: String,

    /// Pulumi stack output holding `host[:port]`
    #[arg(long, default_value = DEFAULT_STACK_OUTPUT)]
    pub stack_output: String,

    /// Database whose restore status and tables are reported
    #[arg(long, default_value = DEFAULT_TARGET_DATABASE)]
    pub target_database: String,

    /// DRIVER value of the connection string
    #[arg(long, default_value = DEFAULT_DRIVER)]
    pub driver: String,

    /// Connection timeout in seconds
    #[arg(long, default_value = "30")]
    pub connect_timeout: u64,

    /// Validate the server certificate instead of trusting it
    #[arg(long)]
    pub strict_tls: bool,
}

/// Flags shared by every invocation
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long, help = "Suppress all log output except errors")]
    pub quiet: bool,
}

impl Cli {
    /// Builds the run configuration, capturing the environment fallback pair.
    pub fn into_run_config(self) -> RunConfig {
        self.into_run_config_with(EnvFallback::from_env())
    }

    /// Builds the run configuration with an explicit environment fallback.
    pub fn into_run_config_with(self, env_fallback: EnvFallback) -> RunConfig {
        RunConfig {
            region: self.region,
            server: self.server,
            port: self.port,
            username: self.username,
            pulumi_dir: self.pulumi_dir,
            config_file: self.config_file,
            secret_id: self.secret_id,
            stack_output: self.stack_output,
            target_database: self.target_database,
            driver: self.driver,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            trust_server_certificate: !self.strict_tls,
            env_fallback,
        }
    }
}
