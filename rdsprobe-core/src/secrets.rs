//! Password retrieval from AWS Secrets Manager.
//!
//! The `aws` CLI is invoked rather than an SDK so the run picks up whatever
//! profile, SSO session or instance role the operator's shell already uses.

use crate::process::{CommandRunner, CommandSpec};
use crate::security::Credential;
use crate::{ProbeError, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Program used for secrets lookups
pub const AWS_PROGRAM: &str = "aws";

#[derive(Deserialize)]
struct SecretValue {
    #[serde(rename = "SecretString")]
    secret_string: Option<String>,
}

/// Builds the `aws secretsmanager get-secret-value` invocation.
pub fn secret_command(secret_id: &str, region: &str) -> CommandSpec {
    CommandSpec::new(AWS_PROGRAM).args([
        "secretsmanager",
        "get-secret-value",
        "--secret-id",
        secret_id,
        "--region",
        region,
    ])
}

/// Extracts `SecretString` from a `get-secret-value` JSON response.
///
/// # Errors
/// Returns a credential error when the payload is not JSON or the field is
/// missing, null, or not a string.
pub fn parse_secret_payload(payload: &str) -> Result<Credential> {
    let value: SecretValue = serde_json::from_str(payload)
        .map_err(|e| ProbeError::credential(format!("response is not valid JSON: {e}")))?;

    value
        .secret_string
        .map(Credential::new)
        .ok_or_else(|| ProbeError::credential("response has no SecretString field"))
}

/// Fetches the database password for `secret_id` in `region`.
///
/// # Errors
/// Returns a credential error if the command cannot be spawned, exits
/// non-zero, or prints an unusable response. There is no retry.
pub fn fetch_password<R>(runner: &R, secret_id: &str, region: &str) -> Result<Credential>
where
    R: CommandRunner + ?Sized,
{
    let spec = secret_command(secret_id, region);
    info!("Fetching secret {} in {}", secret_id, region);

    let output = runner
        .run(&spec)
        .map_err(|e| ProbeError::credential(format!("failed to run `{AWS_PROGRAM}`: {e}")))?;

    if !output.success {
        return Err(ProbeError::credential(format!(
            "`{}` failed: {}",
            spec,
            output.failure_summary()
        )));
    }

    let stdout = Zeroizing::new(output.stdout);
    let credential = parse_secret_payload(&stdout)?;
    if credential.is_empty() {
        warn!("Secret {} holds an empty string", secret_id);
    } else {
        debug!("Secret retrieved");
    }
    Ok(credential)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use std::cell::RefCell;
    use std::io;

    struct ScriptedRunner {
        response: io::Result<CommandOutput>,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        fn new(response: io::Result<CommandOutput>) -> Self {
            Self {
                response,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
            self.calls.borrow_mut().push(spec.clone());
            match &self.response {
                Ok(output) => Ok(output.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    #[test]
    fn test_credential_fetch_success() {
        let runner = ScriptedRunner::new(Ok(CommandOutput::ok(
            r#"{"ARN":"arn:aws:secretsmanager:...","Name":"rds/sqlserver-database-1/password","SecretString":"p@ss"}"#,
        )));

        let credential =
            fetch_password(&runner, "rds/sqlserver-database-1/password", "eu-west-1").unwrap();
        assert_eq!(credential.expose(), "p@ss");

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].to_string(),
            "aws secretsmanager get-secret-value --secret-id rds/sqlserver-database-1/password --region eu-west-1"
        );
    }

    #[test]
    fn test_credential_command_failure() {
        let runner = ScriptedRunner::new(Ok(CommandOutput::failed(
            254,
            "An error occurred (ResourceNotFoundException)",
        )));

        let err = fetch_password(&runner, "missing", "us-east-2").unwrap_err();
        assert!(matches!(err, ProbeError::Credential { .. }));
        assert!(err.to_string().contains("ResourceNotFoundException"));
    }

    #[test]
    fn test_credential_spawn_failure() {
        let runner = ScriptedRunner::new(Err(io::Error::new(
            io::ErrorKind::NotFound,
            "No such file or directory",
        )));

        let err = fetch_password(&runner, "id", "us-east-2").unwrap_err();
        assert!(matches!(err, ProbeError::Credential { .. }));
        assert!(err.to_string().contains("failed to run `aws`"));
    }

    #[test]
    fn test_credential_payload_not_json() {
        let err = parse_secret_payload("<html>").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_credential_payload_missing_field() {
        let err = parse_secret_payload(r#"{"Name":"x"}"#).unwrap_err();
        assert!(err.to_string().contains("no SecretString"));

        let err = parse_secret_payload(r#"{"SecretString":null}"#).unwrap_err();
        assert!(err.to_string().contains("no SecretString"));
    }

    #[test]
    fn test_credential_payload_wrong_type() {
        let err = parse_secret_payload(r#"{"SecretString":42}"#).unwrap_err();
        assert!(matches!(err, ProbeError::Credential { .. }));
    }
}
