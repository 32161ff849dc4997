//! Job orchestration module.
//!
//! This module provides the job lifecycle functions:
//! - Creating a job from a policy document (entry parsing and validation)
//! - Running a job (connect, dispatch every entry, disconnect)

use crate::config::{JobSettings, PolicyDocument};
use crate::error::{JobError, RemoteError};
use crate::logging::Logger;
use crate::model::{BackupEntry, EntryKind, RunOverrides};
use crate::remote::{Connector, Endpoint, RemoteFs};
use crate::walker::TreeWalker;
use std::time::SystemTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One run of a policy document against one remote host.
#[derive(Debug)]
pub struct BackupJob {
    pub id: Uuid,
    pub settings: JobSettings,
    pub entries: Vec<BackupEntry>,
    pub overrides: RunOverrides,
    pub state: JobState,
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    process_dirs: bool,
    process_files: bool,
}

impl BackupJob {
    /// Whether entries of `kind` are processed by this run.
    pub fn processes(&self, kind: EntryKind) -> bool {
        match kind {
            EntryKind::Directory => self.process_dirs,
            EntryKind::File => self.process_files,
            EntryKind::Unknown => false,
        }
    }
}

/// Create a job from a parsed policy document.
///
/// Everything that can be checked without the remote side is checked here,
/// so a broken document never opens a connection.
///
/// # Errors
/// - `MissingType` (2) / `MissingPath` (3) for an incomplete entry
/// - `NoEntries` (4) if the document declares nothing
/// - `InvalidProcessOnlyTypes` (6)
pub fn create_job(document: PolicyDocument, overrides: RunOverrides) -> Result<BackupJob, JobError> {
    let PolicyDocument { options, pathes } = document;

    let entries = pathes
        .into_iter()
        .enumerate()
        .map(|(index, raw)| raw.into_entry(index))
        .collect::<Result<Vec<_>, _>>()?;
    if entries.is_empty() {
        return Err(JobError::NoEntries);
    }

    let (process_dirs, process_files) = options.processed_kinds()?;

    Ok(BackupJob {
        id: Uuid::new_v4(),
        settings: options,
        entries,
        overrides,
        state: JobState::Pending,
        start_time: None,
        end_time: None,
        process_dirs,
        process_files,
    })
}

fn connect_error(err: RemoteError, endpoint: &Endpoint) -> JobError {
    match err {
        RemoteError::AuthenticationFailed { user } => JobError::AuthenticationFailed {
            host: endpoint.host.clone(),
            user,
        },
        other => JobError::Transport {
            message: other.to_string(),
        },
    }
}

/// Run a job: connect, process every entry in document order, disconnect.
///
/// The remote session is closed whatever the outcome. Per-file failures are
/// logged by the walker and do not fail the job.
///
/// # Errors
/// `AuthenticationFailed` (5) or `Transport` (113) while connecting, and any
/// job-fatal error raised while walking an entry.
pub fn run_job(job: &mut BackupJob, connector: &dyn Connector, logger: &Logger) -> Result<(), JobError> {
    job.state = JobState::Running;
    job.start_time = Some(SystemTime::now());
    logger.info(format!("Starting run {}", job.id));
    logger.info(format!("Job settings:\n{}", job.settings));

    let result = connect(job, connector).and_then(|mut remote| {
        let result = process_entries(job, remote.as_ref(), logger);
        remote.close();
        result
    });

    job.end_time = Some(SystemTime::now());
    match &result {
        Ok(()) => {
            job.state = JobState::Completed;
            logger.info(format!("Run {} completed", job.id));
        }
        Err(e) => {
            job.state = JobState::Failed;
            logger.error(format!("Run {} failed with code {}: {}", job.id, e.code(), e));
        }
    }
    result
}

fn connect(job: &BackupJob, connector: &dyn Connector) -> Result<Box<dyn RemoteFs>, JobError> {
    let endpoint = Endpoint::parse(&job.settings.host, &job.settings.user).map_err(|e| {
        JobError::Transport {
            message: e.to_string(),
        }
    })?;
    connector
        .connect(&endpoint, &job.settings.credentials())
        .map_err(|e| connect_error(e, &endpoint))
}

fn process_entries(job: &BackupJob, remote: &dyn RemoteFs, logger: &Logger) -> Result<(), JobError> {
    let walker = TreeWalker::new(remote, &job.overrides, logger, job.settings.copystats);
    let target = &job.settings.targetdir;

    for entry in &job.entries {
        if entry.should_skip(&job.overrides) {
            logger.info(format!(
                "Skipping entry '{}' because options skip is active",
                entry.name
            ));
            continue;
        }
        if entry.kind != EntryKind::Unknown && !job.processes(entry.kind) {
            logger.info(format!(
                "Skipping entry '{}' because type '{}' is not processed",
                entry.name, entry.kind
            ));
            continue;
        }

        logger.info(format!("Executing job-task '{}'", entry.name));
        match entry.kind {
            EntryKind::Directory => walker.walk_top_level(entry.remote_path(), target, entry)?,
            EntryKind::File => walker.transfer_single_file(target, entry)?,
            EntryKind::Unknown => {}
        }
    }
    Ok(())
}
