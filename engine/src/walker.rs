//! Recursive descent over the remote hierarchy.
//!
//! The walker mirrors remote directories below the local target directory,
//! asks the policy evaluator about every folder and file it meets, and hands
//! accepted files to the transfer step. Descent is depth-first, one node at a
//! time.
//!
//! Failure classes:
//! - a file that fails to transfer is logged and skipped
//! - a directory that cannot be listed for lack of permission is logged and
//!   treated as empty
//! - every other listing failure becomes `JobError::Unclassified` (code 1),
//!   while a `JobError` raised deeper in the recursion passes through as is

use crate::error::{JobError, RemoteError};
use crate::fs_ops;
use crate::logging::Logger;
use crate::model::{BackupEntry, Clause, RunOverrides};
use crate::policy::{self, Reason, Verdict};
use crate::remote::{RemoteFs, RemoteStat};
use chrono::DateTime;
use std::path::{Component, Path, PathBuf};

enum WalkError {
    Remote(RemoteError),
    Job(JobError),
}

impl From<RemoteError> for WalkError {
    fn from(err: RemoteError) -> Self {
        WalkError::Remote(err)
    }
}

fn indent(level: usize) -> String {
    "\t".repeat(level)
}

fn format_timestamp(secs: Option<u64>) -> String {
    secs.and_then(|s| DateTime::from_timestamp(s as i64, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Local directory that mirrors `remote_path`.
///
/// With a root index `n` the mirror starts at the n-th normal segment of the
/// remote path (`/a/b/c/d` with `n = 2` gives `<target>/c/d`); otherwise the
/// whole remote path is reproduced below `local_target_dir`.
pub fn local_mirror_dir(
    local_target_dir: &Path,
    remote_path: &Path,
    root_index: Option<usize>,
) -> PathBuf {
    match root_index {
        Some(n) => {
            let rebased: PathBuf = remote_path
                .components()
                .filter_map(|c| match c {
                    Component::Normal(segment) => Some(segment),
                    _ => None,
                })
                .skip(n)
                .collect();
            local_target_dir.join(rebased)
        }
        None => local_target_dir.join(remote_path.strip_prefix("/").unwrap_or(remote_path)),
    }
}

pub struct TreeWalker<'a> {
    remote: &'a dyn RemoteFs,
    overrides: &'a RunOverrides,
    logger: &'a Logger,
    copystats: bool,
}

impl<'a> TreeWalker<'a> {
    pub fn new(
        remote: &'a dyn RemoteFs,
        overrides: &'a RunOverrides,
        logger: &'a Logger,
        copystats: bool,
    ) -> Self {
        TreeWalker {
            remote,
            overrides,
            logger,
            copystats,
        }
    }

    /// Entry point for a directory entry rooted at `remote_root`.
    ///
    /// A missing root, or one that is not a directory, is logged and is not
    /// an error.
    pub fn walk_top_level(
        &self,
        remote_root: &Path,
        local_target_dir: &Path,
        entry: &BackupEntry,
    ) -> Result<(), JobError> {
        self.logger
            .info(format!("\tProcessing folder: '{}'", remote_root.display()));

        match self.remote.stat(remote_root) {
            Err(e) if e.is_not_found() => {
                self.logger
                    .info(format!("\tPath '{}' doesn't exist", remote_root.display()));
            }
            Err(e) => {
                self.logger.info(format!(
                    "\tPath '{}' can't be read: {}",
                    remote_root.display(),
                    e
                ));
            }
            Ok(stat) if !stat.is_dir() => {
                self.logger.info(format!(
                    "\tPath '{}' is not a directory",
                    remote_root.display()
                ));
            }
            Ok(_) => self.walk_directory(0, remote_root, remote_root, local_target_dir, entry)?,
        }

        self.logger.info("Finished");
        Ok(())
    }

    pub fn walk_directory(
        &self,
        level: usize,
        remote_root: &Path,
        remote_path: &Path,
        local_target_dir: &Path,
        entry: &BackupEntry,
    ) -> Result<(), JobError> {
        let t = indent(level + 1);
        let is_root = remote_path.parent().is_none();
        let local_dir = if is_root {
            local_target_dir.to_path_buf()
        } else {
            local_mirror_dir(
                local_target_dir,
                remote_path,
                entry.path_rootindex(self.overrides),
            )
        };

        let verdict = policy::evaluate_folder(
            remote_root,
            remote_path,
            entry.options.as_ref(),
            self.overrides,
        )?;
        if let Verdict::Reject(reason) = verdict {
            self.logger.info(format!(
                "{t}Excluding '{}' due to folder-option '{reason}'",
                remote_path.display()
            ));
            return Ok(());
        }

        if fs_ops::ensure_dir_exists(&local_dir)? {
            self.logger
                .info(format!("{t}Creating parent folders '{}'", local_dir.display()));
        }

        match self.descend(level, remote_root, remote_path, &local_dir, local_target_dir, entry) {
            Ok(()) => Ok(()),
            Err(WalkError::Job(e)) => Err(e),
            Err(WalkError::Remote(e)) if e.is_permission_denied() => {
                self.logger.info(format!(
                    "{t}PermissionError while listing contents of {}",
                    remote_path.display()
                ));
                Ok(())
            }
            Err(WalkError::Remote(e)) => Err(JobError::Unclassified {
                path: remote_path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    fn descend(
        &self,
        level: usize,
        remote_root: &Path,
        remote_path: &Path,
        local_dir: &Path,
        local_target_dir: &Path,
        entry: &BackupEntry,
    ) -> Result<(), WalkError> {
        let t = indent(level + 1);
        let names = self.remote.listdir(remote_path)?;
        let recurse = entry.recurse(self.overrides);

        for name in names {
            let node = remote_path.join(&name);
            let stat = match self.remote.lstat(&node) {
                Ok(stat) => stat,
                Err(e) if e.is_permission_denied() => {
                    self.logger.info(format!(
                        "{t}PermissionError while reading status of {}",
                        node.display()
                    ));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if stat.is_dir() {
                if recurse {
                    self.logger
                        .info(format!("{t}Recursing into sub-directory '{}'", node.display()));
                    self.walk_directory(level + 1, remote_root, &node, local_target_dir, entry)
                        .map_err(WalkError::Job)?;
                }
            } else {
                self.transfer_file(level, remote_root, &local_dir.join(&name), &node, entry);
            }
        }
        Ok(())
    }

    /// Transfer one remote file to `local_file` if the entry's clauses accept
    /// it. Failures are logged and never propagate.
    pub fn transfer_file(
        &self,
        level: usize,
        remote_root: &Path,
        local_file: &Path,
        remote_node: &Path,
        entry: &BackupEntry,
    ) {
        let t = indent(level + 1);
        if let Err(e) = self.try_transfer(&t, remote_root, local_file, remote_node, entry) {
            self.logger.error(format!(
                "{t}Error while transferring '{}': {e}",
                remote_node.display()
            ));
        }
    }

    fn try_transfer(
        &self,
        t: &str,
        remote_root: &Path,
        local_file: &Path,
        remote_node: &Path,
        entry: &BackupEntry,
    ) -> Result<(), RemoteError> {
        let remote_stat = if entry.simulate(self.overrides) {
            None
        } else {
            Some(self.remote.lstat(remote_node)?)
        };

        self.logger
            .info(format!("{t}Processing file: '{}'", remote_node.display()));

        if let (Some(options), Some(stat)) = (entry.options.as_ref(), remote_stat.as_ref()) {
            let verdict = policy::evaluate_file(
                options,
                remote_root,
                local_file,
                remote_node,
                stat,
                self.overrides,
            );
            if let Verdict::Reject(reason) = verdict {
                if reason == Reason::Clause(Clause::OverwriteNewer) {
                    self.logger.info(format!(
                        "{t}Remote modification time {} is not newer than the local copy",
                        format_timestamp(stat.mtime)
                    ));
                }
                self.logger.info(format!(
                    "{t}Excluding '{}' due to file-option '{reason}'",
                    remote_node.display()
                ));
                return Ok(());
            }
        }

        match remote_stat {
            None => {
                self.logger.info(format!(
                    "{t}Simulating download of file '{}'",
                    remote_node.display()
                ));
            }
            Some(stat) => self.download(t, local_file, remote_node, &stat)?,
        }
        Ok(())
    }

    fn download(
        &self,
        t: &str,
        local_file: &Path,
        remote_node: &Path,
        stat: &RemoteStat,
    ) -> Result<(), RemoteError> {
        self.logger.info(format!(
            "{t}Downloading file (Total: {})",
            fs_ops::format_bytes(stat.size.unwrap_or(0))
        ));
        self.remote.get(remote_node, local_file)?;

        if self.copystats {
            self.logger.info(format!("{t}Copying file modification dates"));
            fs_ops::copy_remote_times(local_file, stat).map_err(|source| RemoteError::Io {
                path: local_file.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Entry point for a file entry: the remote file is mirrored with its full
    /// path below `local_target_dir`.
    pub fn transfer_single_file(
        &self,
        local_target_dir: &Path,
        entry: &BackupEntry,
    ) -> Result<(), JobError> {
        let remote_file = entry.remote_path();
        let local_file =
            local_target_dir.join(remote_file.strip_prefix("/").unwrap_or(remote_file));

        if let Some(local_dir) = local_file.parent() {
            if fs_ops::ensure_dir_exists(local_dir)? {
                self.logger
                    .info(format!("Creating folder '{}'", local_dir.display()));
            }
        }

        self.transfer_file(1, remote_file, &local_file, remote_file, entry);
        Ok(())
    }
}
