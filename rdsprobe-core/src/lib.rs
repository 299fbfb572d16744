//! Core building blocks for rdsprobe.
//!
//! This crate holds everything the `rdsprobe` binary needs to check a SQL
//! Server instance on RDS: credential retrieval through the AWS CLI,
//! endpoint discovery through Pulumi stack outputs with local fallbacks,
//! connection-string assembly, and the fixed diagnostic probe itself.
//!
//! # Safety Guarantees
//! - Only read-only queries are issued against the server
//! - Passwords live in zeroizing containers and are never logged
//! - External commands are spawned with an explicit working directory;
//!   the process working directory is never changed
//!
//! # Architecture
//! - Strategy chain for endpoint resolution with tagged results
//! - `Connector`/`Session` seam between the probe sequence and the driver
//! - `CommandRunner` seam between resolvers and process spawning

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod probe;
pub mod process;
pub mod report;
pub mod secrets;
pub mod security;

// Re-export commonly used types
pub use config::{EnvFallback, RunConfig};
pub use connection::{ConnectionString, build_connection_string};
pub use endpoint::{Endpoint, EndpointResolver, EndpointSource, ResolvedEndpoint, Resolution};
pub use error::{ProbeError, Result};
pub use logging::init_logging;
pub use probe::{Connector, ProbeOutcome, Prober, ResultSet, Session};
pub use process::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use report::Reporter;
pub use secrets::fetch_password;
pub use security::Credential;

#[cfg(feature = "mssql")]
pub use probe::sqlserver::SqlServerConnector;
