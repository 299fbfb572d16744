//! SQL Server on RDS connectivity check.
//!
//! Retrieves the admin password through the AWS CLI, resolves the instance
//! endpoint, and runs a read-only diagnostic probe. The report goes to
//! stdout, logs to stderr.
//!
//! # Security Guarantees
//! - Read-only queries only
//! - The password is never logged or printed
//! - The working directory is never changed

use clap::Parser;
use rdsprobe::{Cli, report_failure, workflow};
use rdsprobe_core::{Reporter, SystemRunner, init_logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let config = cli.into_run_config();
    let mut reporter = Reporter::stdout();

    let result = workflow::run(&config, &SystemRunner, &mut reporter);
    if let Err(err) = &result {
        if let Err(write_err) = report_failure(&mut reporter, err) {
            eprintln!("{write_err}");
        }
    }

    ExitCode::from(workflow::exit_status(&result))
}
