//! rdsprobe: connectivity and restore-status check for SQL Server on RDS.
//!
//! The binary is a thin wrapper; argument handling and the end-to-end run
//! live here so integration tests can drive them with fakes.

pub mod cli;
pub mod workflow;

pub use cli::{Cli, GlobalArgs};
pub use workflow::{execute, exit_status, report_failure};
