//! End-to-end probe run: credential, endpoint, connection string, probe.
//!
//! Every collaborator is passed in, so tests drive the whole run with a
//! scripted command runner and an in-memory connector.

use rdsprobe_core::config::MASTER_DATABASE;
use rdsprobe_core::{
    CommandRunner, Connector, EndpointResolver, ProbeError, ProbeOutcome, Prober, Reporter,
    Result, RunConfig, build_connection_string, fetch_password,
};
use std::io::Write;
use tracing::{error, info};

/// Banner printed when the probe aborts on a driver error
pub const CONNECTION_FAILURE: &str = "Failed to connect to SQL Server.";

/// Runs one probe.
///
/// # Errors
/// Returns the first fatal error: credential retrieval, endpoint
/// resolution, a driver failure, or a report write failure.
pub async fn execute<R, C, W>(
    config: &RunConfig,
    runner: &R,
    connector: C,
    reporter: &mut Reporter<W>,
) -> Result<ProbeOutcome>
where
    R: CommandRunner + ?Sized,
    C: Connector,
    W: Write,
{
    reporter.line(format_args!("Using AWS region: {}", config.region))?;
    reporter.line("Retrieving password from AWS Secrets Manager...")?;
    let credential = fetch_password(runner, &config.secret_id, &config.region)?;

    let resolved = EndpointResolver::standard(config, runner).resolve()?;
    for note in &resolved.fallbacks {
        reporter.line(format_args!("Skipped endpoint source: {note}"))?;
    }
    reporter.line(format_args!(
        "Using server details from {}.",
        resolved.source.describe()
    ))?;

    let master = build_connection_string(
        &config.driver,
        &resolved.endpoint.host,
        resolved.endpoint.port,
        MASTER_DATABASE,
        &config.username,
        credential.expose(),
    );
    drop(credential);
    info!("Probing {}", master);

    Prober::new(connector, config.target_database.as_str())
        .run(&master, reporter)
        .await
}

/// Runs one probe against SQL Server on a current-thread runtime.
///
/// # Errors
/// Returns any error from [`execute`], or an I/O error if the runtime
/// cannot be started.
#[cfg(feature = "mssql")]
pub fn run<R, W>(config: &RunConfig, runner: &R, reporter: &mut Reporter<W>) -> Result<ProbeOutcome>
where
    R: CommandRunner + ?Sized,
    W: Write,
{
    use rdsprobe_core::SqlServerConnector;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ProbeError::io("Failed to start async runtime", e))?;

    let connector =
        SqlServerConnector::new(config.connect_timeout, config.trust_server_certificate);
    runtime.block_on(execute(config, runner, connector, reporter))
}

/// Fails before any other work: this build has no SQL Server driver.
///
/// # Errors
/// Always returns a missing dependency error.
#[cfg(not(feature = "mssql"))]
pub fn run<R, W>(
    _config: &RunConfig,
    _runner: &R,
    _reporter: &mut Reporter<W>,
) -> Result<ProbeOutcome>
where
    R: CommandRunner + ?Sized,
    W: Write,
{
    Err(ProbeError::missing_dependency("SQL Server driver (tiberius)"))
}

/// Prints a fatal error with its hints.
///
/// # Errors
/// Returns an I/O error if the report cannot be written.
pub fn report_failure<W: Write>(reporter: &mut Reporter<W>, err: &ProbeError) -> Result<()> {
    error!("{}", err);
    if err.is_database() {
        reporter.section(format_args!("Error: {err}"))?;
        reporter.failure(CONNECTION_FAILURE)?;
    } else {
        // the other variants already read as a sentence
        reporter.section(err)?;
    }
    reporter.hints(err.remediation())
}

/// Process exit status for a run: 0 on success, 1 on any fatal error.
pub const fn exit_status<T>(result: &Result<T>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
