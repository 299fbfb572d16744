//! SQL Server endpoint discovery.
//!
//! The endpoint comes from the first source in a fixed order that produces
//! one:
//!
//! 1. `--server` and `--port` given together on the command line
//! 2. the Pulumi stack output (`pulumi stack output sqlServerEndpoint`)
//! 3. a local JSON file with `server` and `port` fields
//! 4. `SQL_SERVER_HOST` / `SQL_SERVER_PORT`
//!
//! Each source is an [`EndpointStrategy`] returning a [`Resolution`], so a
//! source that does not apply is distinguishable from one that failed.

use crate::config::{DEFAULT_SQL_PORT, EnvFallback, RunConfig};
use crate::process::{CommandRunner, CommandSpec};
use crate::{ProbeError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Program used for stack output lookups
pub const PULUMI_PROGRAM: &str = "pulumi";

/// Network location of the SQL Server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where a resolved endpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    /// `--server` and `--port`
    CommandLine,
    /// Pulumi stack output
    StackOutput,
    /// Local JSON config file
    ConfigFile,
    /// `SQL_SERVER_HOST` / `SQL_SERVER_PORT`
    Environment,
}

impl EndpointSource {
    /// Human-readable source name for the report.
    pub const fn describe(self) -> &'static str {
        match self {
            Self::CommandLine => "command line arguments",
            Self::StackOutput => "Pulumi stack output",
            Self::ConfigFile => "configuration file",
            Self::Environment => "environment variables",
        }
    }
}

/// Outcome of a single endpoint source.
#[derive(Debug)]
pub enum Resolution {
    /// The source produced an endpoint
    Found(Endpoint),
    /// The source has nothing to offer (flag missing, file absent, ...)
    NotApplicable(String),
    /// The source was tried and failed
    Failed(ProbeError),
}

/// Failure to parse a `host[:port]` string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointParseError {
    /// Nothing to parse, or an empty host
    #[error("endpoint is empty")]
    Empty,
    /// Port part is not a valid TCP port
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// Parses `host` or `host:port`; a missing port defaults to 1433.
///
/// # Errors
/// Returns an error for an empty host or a port that is not a `u16`.
///
/// # Example
/// ```rust
/// use rdsprobe_core::endpoint::{Endpoint, parse_host_port};
///
/// assert_eq!(parse_host_port("db.local").unwrap(), Endpoint::new("db.local", 1433));
/// assert_eq!(parse_host_port("db.local:5000").unwrap(), Endpoint::new("db.local", 5000));
/// ```
pub fn parse_host_port(raw: &str) -> std::result::Result<Endpoint, EndpointParseError> {
    let raw = raw.trim();
    let (host, port) = match raw.split_once(':') {
        Some((host, port)) => {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| EndpointParseError::InvalidPort(port.to_string()))?;
            (host.trim(), port)
        }
        None => (raw, DEFAULT_SQL_PORT),
    };

    if host.is_empty() {
        return Err(EndpointParseError::Empty);
    }
    Ok(Endpoint::new(host, port))
}

/// One endpoint source in the resolution chain.
pub trait EndpointStrategy {
    /// Source reported when this strategy succeeds.
    fn source(&self) -> EndpointSource;

    /// Attempts to produce an endpoint.
    fn try_resolve(&self) -> Resolution;
}

/// Uses `--server`/`--port` when both were supplied.
#[derive(Debug)]
pub struct ExplicitEndpoint<'a> {
    server: Option<&'a str>,
    port: Option<u16>,
}

impl<'a> ExplicitEndpoint<'a> {
    /// Creates the strategy from the optional CLI values.
    pub const fn new(server: Option<&'a str>, port: Option<u16>) -> Self {
        Self { server, port }
    }
}

impl EndpointStrategy for ExplicitEndpoint<'_> {
    fn source(&self) -> EndpointSource {
        EndpointSource::CommandLine
    }

    fn try_resolve(&self) -> Resolution {
        match (self.server, self.port) {
            (Some(server), Some(port)) if !server.is_empty() => {
                Resolution::Found(Endpoint::new(server, port))
            }
            (None, None) => Resolution::NotApplicable("no --server/--port given".to_string()),
            _ => {
                warn!("--server and --port must be given together; ignoring the one supplied");
                Resolution::NotApplicable("only one of --server/--port given".to_string())
            }
        }
    }
}

/// Reads the endpoint from a Pulumi stack output.
pub struct StackOutputEndpoint<'a, R: ?Sized> {
    runner: &'a R,
    pulumi_dir: &'a Path,
    output_key: &'a str,
}

impl<'a, R> StackOutputEndpoint<'a, R>
where
    R: CommandRunner + ?Sized,
{
    /// Creates the strategy.
    pub const fn new(runner: &'a R, pulumi_dir: &'a Path, output_key: &'a str) -> Self {
        Self {
            runner,
            pulumi_dir,
            output_key,
        }
    }

    /// The invocation this strategy runs.
    ///
    /// The child runs inside `pulumi_dir` when that directory exists and in
    /// the current directory otherwise.
    pub fn command(&self) -> CommandSpec {
        let spec = CommandSpec::new(PULUMI_PROGRAM).args(["stack", "output", self.output_key]);
        if self.pulumi_dir.is_dir() {
            spec.current_dir(self.pulumi_dir)
        } else {
            debug!(
                "Pulumi directory {} not found, using current directory",
                self.pulumi_dir.display()
            );
            spec
        }
    }
}

impl<R> EndpointStrategy for StackOutputEndpoint<'_, R>
where
    R: CommandRunner + ?Sized,
{
    fn source(&self) -> EndpointSource {
        EndpointSource::StackOutput
    }

    fn try_resolve(&self) -> Resolution {
        let spec = self.command();
        let output = match self.runner.run(&spec) {
            Ok(output) => output,
            Err(e) => {
                return Resolution::Failed(ProbeError::external_command(
                    spec.to_string(),
                    e.to_string(),
                ));
            }
        };

        if !output.success {
            return Resolution::Failed(ProbeError::external_command(
                spec.to_string(),
                output.failure_summary(),
            ));
        }

        match parse_host_port(&output.stdout) {
            Ok(endpoint) => Resolution::Found(endpoint),
            Err(e) => Resolution::Failed(ProbeError::external_command(
                spec.to_string(),
                format!("unusable output: {e}"),
            )),
        }
    }
}

#[derive(Deserialize)]
struct ConfigFileContents {
    server: Option<String>,
    port: Option<serde_json::Value>,
}

fn coerce_port(value: &serde_json::Value) -> Option<u16> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads `server`/`port` from a local JSON file.
#[derive(Debug)]
pub struct ConfigFileEndpoint<'a> {
    path: &'a Path,
}

impl<'a> ConfigFileEndpoint<'a> {
    /// Creates the strategy for `path`.
    pub const fn new(path: &'a Path) -> Self {
        Self { path }
    }
}

impl EndpointStrategy for ConfigFileEndpoint<'_> {
    fn source(&self) -> EndpointSource {
        EndpointSource::ConfigFile
    }

    fn try_resolve(&self) -> Resolution {
        let raw = match std::fs::read_to_string(self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Resolution::NotApplicable(format!(
                    "{} does not exist",
                    self.path.display()
                ));
            }
            Err(e) => return Resolution::Failed(ProbeError::config_file(self.path, e.to_string())),
        };

        let contents: ConfigFileContents = match serde_json::from_str(&raw) {
            Ok(contents) => contents,
            Err(e) => return Resolution::Failed(ProbeError::config_file(self.path, e.to_string())),
        };

        match (contents.server, contents.port) {
            (Some(server), Some(port)) => match coerce_port(&port) {
                Some(port) => Resolution::Found(Endpoint::new(server, port)),
                None => Resolution::Failed(ProbeError::config_file(
                    self.path,
                    format!("port {port} is not a valid TCP port"),
                )),
            },
            _ => Resolution::NotApplicable(format!(
                "{} does not define both server and port",
                self.path.display()
            )),
        }
    }
}

/// Reads `SQL_SERVER_HOST` / `SQL_SERVER_PORT` captured at startup.
#[derive(Debug)]
pub struct EnvironmentEndpoint<'a> {
    fallback: &'a EnvFallback,
}

impl<'a> EnvironmentEndpoint<'a> {
    /// Creates the strategy.
    pub const fn new(fallback: &'a EnvFallback) -> Self {
        Self { fallback }
    }
}

impl EndpointStrategy for EnvironmentEndpoint<'_> {
    fn source(&self) -> EndpointSource {
        EndpointSource::Environment
    }

    fn try_resolve(&self) -> Resolution {
        let Some(host) = self.fallback.host.as_deref() else {
            return Resolution::NotApplicable("SQL_SERVER_HOST not set".to_string());
        };

        let port = match self.fallback.port.as_deref() {
            None => DEFAULT_SQL_PORT,
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    return Resolution::Failed(ProbeError::configuration(format!(
                        "SQL_SERVER_PORT={raw:?} is not a valid TCP port"
                    )));
                }
            },
        };

        Resolution::Found(Endpoint::new(host.trim(), port))
    }
}

/// Successful chain result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// The endpoint
    pub endpoint: Endpoint,
    /// Which strategy produced it
    pub source: EndpointSource,
    /// Failures of earlier sources, for the report
    pub fallbacks: Vec<String>,
}

/// Ordered chain of endpoint strategies.
pub struct EndpointResolver<'a> {
    strategies: Vec<Box<dyn EndpointStrategy + 'a>>,
}

impl<'a> EndpointResolver<'a> {
    /// Builds a resolver from an explicit strategy list.
    pub fn new(strategies: Vec<Box<dyn EndpointStrategy + 'a>>) -> Self {
        Self { strategies }
    }

    /// Builds the standard chain: flags, Pulumi, config file, environment.
    pub fn standard<R>(config: &'a RunConfig, runner: &'a R) -> Self
    where
        R: CommandRunner + ?Sized,
    {
        Self::new(vec![
            Box::new(ExplicitEndpoint::new(config.server.as_deref(), config.port)),
            Box::new(StackOutputEndpoint::new(
                runner,
                &config.pulumi_dir,
                &config.stack_output,
            )),
            Box::new(ConfigFileEndpoint::new(&config.config_file)),
            Box::new(EnvironmentEndpoint::new(&config.env_fallback)),
        ])
    }

    /// Tries each strategy in order and returns the first endpoint found.
    ///
    /// # Errors
    /// Returns an endpoint resolution error when no strategy produced one.
    pub fn resolve(&self) -> Result<ResolvedEndpoint> {
        let mut fallbacks = Vec::new();
        // only a failed environment step means the host was set
        let mut host_missing = true;

        for strategy in &self.strategies {
            let source = strategy.source();
            match strategy.try_resolve() {
                Resolution::Found(endpoint) => {
                    info!("Endpoint {} from {}", endpoint, source.describe());
                    return Ok(ResolvedEndpoint {
                        endpoint,
                        source,
                        fallbacks,
                    });
                }
                Resolution::NotApplicable(reason) => {
                    debug!("Skipping {}: {}", source.describe(), reason);
                }
                Resolution::Failed(error) => {
                    warn!("{} unavailable: {}", source.describe(), error);
                    if source == EndpointSource::Environment {
                        host_missing = false;
                    }
                    fallbacks.push(error.to_string());
                }
            }
        }

        let mut message =
            "no server from command line, Pulumi, config file or environment".to_string();
        for failure in &fallbacks {
            message.push_str("; ");
            message.push_str(failure);
        }
        Err(ProbeError::endpoint_resolution(message, host_missing))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::io;
    use std::path::PathBuf;

    /// Runner that answers every call with the same scripted output.
    struct FakeRunner {
        output: Option<CommandOutput>,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl FakeRunner {
        fn answering(output: CommandOutput) -> Self {
            Self {
                output: Some(output),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn missing() -> Self {
            Self {
                output: None,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
            self.calls.borrow_mut().push(spec.clone());
            self.output
                .clone()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "pulumi: not found"))
        }
    }

    fn config_in(dir: &Path) -> RunConfig {
        RunConfig {
            pulumi_dir: dir.join("sql-server-pulumi"),
            config_file: dir.join("sql_config.json"),
            env_fallback: EnvFallback {
                host: Some("env-host".to_string()),
                port: Some("2433".to_string()),
            },
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_parse_host_port() {
        assert_eq!(
            parse_host_port("myhost:1433").unwrap(),
            Endpoint::new("myhost", 1433)
        );
        assert_eq!(
            parse_host_port("  db.rds.amazonaws.com\n").unwrap(),
            Endpoint::new("db.rds.amazonaws.com", 1433)
        );
        assert_eq!(parse_host_port(""), Err(EndpointParseError::Empty));
        assert_eq!(parse_host_port(":1433"), Err(EndpointParseError::Empty));
        assert!(matches!(
            parse_host_port("host:abc"),
            Err(EndpointParseError::InvalidPort(_))
        ));
        assert!(matches!(
            parse_host_port("host:1:2"),
            Err(EndpointParseError::InvalidPort(_))
        ));
        assert!(matches!(
            parse_host_port("host:70000"),
            Err(EndpointParseError::InvalidPort(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_parse_host_port_accepts_rendered_endpoints(
            host in "[a-z][a-z0-9.-]{0,40}",
            port in any::<u16>(),
        ) {
            let parsed = parse_host_port(&format!("{host}:{port}")).unwrap();
            prop_assert_eq!(parsed, Endpoint::new(host.clone(), port));

            let bare = parse_host_port(&host).unwrap();
            prop_assert_eq!(bare.port, DEFAULT_SQL_PORT);
        }
    }

    #[test]
    fn test_explicit_flags_skip_stack_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            server: Some("cli-host".to_string()),
            port: Some(1444),
            ..config_in(dir.path())
        };
        let runner = FakeRunner::answering(CommandOutput::ok("pulumi-host:1433"));

        let resolved = EndpointResolver::standard(&config, &runner).resolve().unwrap();

        assert_eq!(resolved.endpoint, Endpoint::new("cli-host", 1444));
        assert_eq!(resolved.source, EndpointSource::CommandLine);
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_single_flag_falls_through_to_stack_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            server: Some("cli-host".to_string()),
            ..config_in(dir.path())
        };
        let runner = FakeRunner::answering(CommandOutput::ok("pulumi-host:1500\n"));

        let resolved = EndpointResolver::standard(&config, &runner).resolve().unwrap();

        assert_eq!(resolved.endpoint, Endpoint::new("pulumi-host", 1500));
        assert_eq!(resolved.source, EndpointSource::StackOutput);
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn test_stack_output_without_port_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = FakeRunner::answering(CommandOutput::ok("myhost\n"));

        let resolved = EndpointResolver::standard(&config, &runner).resolve().unwrap();
        assert_eq!(resolved.endpoint, Endpoint::new("myhost", 1433));
        assert!(resolved.fallbacks.is_empty());
    }

    #[test]
    fn test_stack_output_runs_inside_existing_pulumi_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::create_dir(&config.pulumi_dir).unwrap();
        let runner = FakeRunner::answering(CommandOutput::ok("myhost:1433"));

        EndpointResolver::standard(&config, &runner).resolve().unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].program, "pulumi");
        assert_eq!(calls[0].args, ["stack", "output", "sqlServerEndpoint"]);
        assert_eq!(calls[0].current_dir.as_deref(), Some(config.pulumi_dir.as_path()));
    }

    #[test]
    fn test_stack_output_missing_pulumi_dir_uses_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = FakeRunner::answering(CommandOutput::ok("myhost:1433"));

        EndpointResolver::standard(&config, &runner).resolve().unwrap();
        assert_eq!(runner.calls.borrow()[0].current_dir, None);
    }

    #[test]
    fn test_config_file_used_after_stack_output_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.config_file, r#"{"server":"h2","port":5000}"#).unwrap();
        let runner =
            FakeRunner::answering(CommandOutput::failed(255, "error: no stack named 'dev'"));

        let resolved = EndpointResolver::standard(&config, &runner).resolve().unwrap();

        // env-host is configured, so reaching it would change the result
        assert_eq!(resolved.endpoint, Endpoint::new("h2", 5000));
        assert_eq!(resolved.source, EndpointSource::ConfigFile);
        assert_eq!(resolved.fallbacks.len(), 1);
        assert!(resolved.fallbacks[0].contains("no stack named"));
    }

    #[test]
    fn test_config_file_port_may_be_a_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"server":"h3","port":"1435"}"#).unwrap();

        match ConfigFileEndpoint::new(&path).try_resolve() {
            Resolution::Found(endpoint) => assert_eq!(endpoint, Endpoint::new("h3", 1435)),
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn test_environment_used_when_config_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = FakeRunner::missing();

        let resolved = EndpointResolver::standard(&config, &runner).resolve().unwrap();

        assert_eq!(resolved.endpoint, Endpoint::new("env-host", 2433));
        assert_eq!(resolved.source, EndpointSource::Environment);
        // only the Pulumi failure is reported; an absent file is not a failure
        assert_eq!(resolved.fallbacks.len(), 1);
    }

    #[test]
    fn test_environment_used_when_config_file_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.config_file, "{ server: ").unwrap();
        let runner = FakeRunner::missing();

        let resolved = EndpointResolver::standard(&config, &runner).resolve().unwrap();

        assert_eq!(resolved.source, EndpointSource::Environment);
        assert_eq!(resolved.fallbacks.len(), 2);
        assert!(resolved.fallbacks[1].contains("sql_config.json"));
    }

    #[test]
    fn test_config_file_missing_port_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.config_file, r#"{"server":"h2"}"#).unwrap();
        let runner = FakeRunner::missing();

        let resolved = EndpointResolver::standard(&config, &runner).resolve().unwrap();
        assert_eq!(resolved.source, EndpointSource::Environment);
    }

    #[test]
    fn test_environment_port_defaults() {
        let fallback = EnvFallback {
            host: Some("env-host".to_string()),
            port: None,
        };
        match EnvironmentEndpoint::new(&fallback).try_resolve() {
            Resolution::Found(endpoint) => assert_eq!(endpoint.port, 1433),
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn test_environment_invalid_port_fails() {
        let fallback = EnvFallback {
            host: Some("env-host".to_string()),
            port: Some("fourteen".to_string()),
        };
        assert!(matches!(
            EnvironmentEndpoint::new(&fallback).try_resolve(),
            Resolution::Failed(_)
        ));
    }

    #[test]
    fn test_exhausted_chain_is_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            env_fallback: EnvFallback::default(),
            ..config_in(dir.path())
        };
        let runner = FakeRunner::missing();

        let err = EndpointResolver::standard(&config, &runner)
            .resolve()
            .unwrap_err();

        assert!(matches!(err, ProbeError::EndpointResolution { .. }));
        assert!(err.to_string().contains("pulumi stack output"));
        assert!(
            err.remediation()
                .iter()
                .any(|hint| hint.contains("SQL_SERVER_HOST"))
        );
    }

    #[test]
    fn test_invalid_environment_port_is_not_reported_as_missing_host() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            env_fallback: EnvFallback {
                host: Some("db.example.com".to_string()),
                port: Some("14x3".to_string()),
            },
            ..config_in(dir.path())
        };
        let runner = FakeRunner::missing();

        let err = EndpointResolver::standard(&config, &runner)
            .resolve()
            .unwrap_err();

        assert!(matches!(
            err,
            ProbeError::EndpointResolution {
                host_missing: false,
                ..
            }
        ));
        assert!(err.to_string().contains("14x3"));
        let hints = err.remediation();
        assert!(hints.iter().all(|hint| !hint.contains("SQL_SERVER_HOST")));
        assert!(hints.iter().any(|hint| hint.contains("SQL_SERVER_PORT")));
    }

    #[test]
    fn test_working_directory_unchanged_by_stack_output() {
        let dir = tempfile::tempdir().unwrap();
        let pulumi_dir = dir.path().join("infra");
        std::fs::create_dir(&pulumi_dir).unwrap();
        let before = std::env::current_dir().unwrap();

        let succeeding = FakeRunner::answering(CommandOutput::ok("h:1433"));
        let _ =
            StackOutputEndpoint::new(&succeeding, &pulumi_dir, "sqlServerEndpoint").try_resolve();
        assert_eq!(std::env::current_dir().unwrap(), before);

        let system = crate::process::SystemRunner;
        let missing_tool = StackOutputEndpoint::new(&system, &pulumi_dir, "no-such-output");
        let spec = missing_tool.command();
        assert_eq!(spec.current_dir, Some(PathBuf::from(&pulumi_dir)));
        let _ = missing_tool.try_resolve();
        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}
