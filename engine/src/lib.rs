//! # sftp-backup engine - policy-driven remote tree replication
//!
//! Mirrors files and directory trees from a remote host reachable over SFTP
//! into a local target directory. What gets copied is decided per entry by a
//! JSON policy document: glob include/exclude rules, overwrite rules, folder
//! groups, recursion, simulation.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{create_job, run_job, LoggerRegistry, PolicyDocument, RunOverrides, SftpConnector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = PolicyDocument::load("backup.json".as_ref())?;
//!
//! let mut registry = LoggerRegistry::new("backup");
//! let logger = registry.add_logger(&document.options.name, &document.options.handler_configs()?)?;
//!
//! let mut job = create_job(document, RunOverrides::new(Some("nightly".into()), ["simulate"]))?;
//! run_job(&mut job, &SftpConnector, &logger)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Entries, option clauses, run overrides
//! - **error**: Error types and job exit codes
//! - **config**: Policy document loading
//! - **policy**: Folder and file accept/reject decisions
//! - **remote**: Remote filesystem contract, endpoint and credentials
//! - **sftp**: `ssh2` implementation of the remote contract
//! - **walker**: Recursive descent and the file transfer step
//! - **job**: Job orchestration (create, run)
//! - **fs_ops**: Local filesystem helpers
//! - **logging**: Run-scoped logger registry

pub mod model;
pub mod error;
pub mod config;
pub mod policy;
pub mod remote;
pub mod sftp;
pub mod walker;
pub mod job;
pub mod fs_ops;
pub mod logging;

#[cfg(test)]
mod testing;

// Re-export main types and functions
pub use model::{BackupEntry, Clause, EntryKind, EntryOptions, Patterns, RunOverrides};
pub use error::{ConfigError, JobError, RemoteError};
pub use config::{JobSettings, PolicyDocument};
pub use policy::{evaluate_file, evaluate_folder, Reason, Verdict};
pub use remote::{Connector, Credentials, Endpoint, RemoteFs, RemoteStat};
pub use sftp::SftpConnector;
pub use walker::TreeWalker;
pub use job::{create_job, run_job, BackupJob, JobState};
pub use logging::{HandlerConfig, LogLevel, Logger, LoggerRegistry};
