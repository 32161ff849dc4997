//! sftp-backup - Command-line interface for the replication engine.
//!
//! Loads a policy document, runs its job against the remote host and exits
//! with the job's error code (0 on success).

use clap::Parser;
use engine::{
    create_job, run_job, ConfigError, Connector, JobError, LoggerRegistry, PolicyDocument,
    RunOverrides, SftpConnector,
};
use std::path::PathBuf;

/// Exit status for failures that happen before a job exists.
const CONFIG_EXIT_CODE: i32 = 2;

/// sftp-backup - Policy-driven SFTP backup
#[derive(Parser, Debug)]
#[command(name = "sftp-backup")]
#[command(version = "0.1.0")]
#[command(about = "Mirror remote trees over SFTP as described by a JSON policy document")]
struct Args {
    /// Policy document (JSON)
    #[arg(long, value_name = "PATH")]
    configfile: PathBuf,

    /// Only process folders whose `group` option matches
    #[arg(long, value_name = "NAME")]
    group: Option<String>,

    /// Option clauses to ignore for this run, comma separated
    #[arg(long = "ignore-options", value_name = "OPTIONS", value_delimiter = ',')]
    ignore_options: Vec<String>,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Job(JobError),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => CONFIG_EXIT_CODE,
            CliError::Job(e) => e.code(),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err)
    }
}

/// Parse arguments, run the job and exit with its code
fn main() {
    let args = Args::parse();

    let exit_code = match run_cli(&args, &SftpConnector) {
        Ok(()) => 0,
        Err(CliError::Config(e)) => {
            eprintln!("Error: {}", e);
            CONFIG_EXIT_CODE
        }
        // Already reported through the job's logger
        Err(err) => err.exit_code(),
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args, connector: &dyn Connector) -> Result<(), CliError> {
    let document = PolicyDocument::load(&args.configfile)?;

    let mut registry = LoggerRegistry::new("backup");
    let handlers = document.options.handler_configs()?;
    let logger = registry.add_logger(&document.options.name, &handlers)?;

    let overrides = RunOverrides::new(args.group.clone(), args.ignore_options.iter().cloned());

    let mut job = create_job(document, overrides).map_err(|e| {
        logger.error(format!("Invalid job (code {}): {}", e.code(), e));
        CliError::Job(e)
    })?;

    run_job(&mut job, connector, &logger).map_err(CliError::Job)
}
