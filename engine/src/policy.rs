//! Accept/reject decisions for remote folders and files.
//!
//! Both evaluators are pure: they read the entry's clauses and the run
//! overrides, consult the local filesystem only for existence and mtime, and
//! return a [`Verdict`]. The first rejecting clause wins and later clauses are
//! not looked at.

use crate::error::JobError;
use crate::fs_ops;
use crate::model::{Clause, EntryOptions, Patterns, RunOverrides};
use crate::remote::RemoteStat;
use glob::Pattern;
use std::fmt;
use std::path::Path;

/// Why a node was rejected. Displays as the clause name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Remote node is a symbolic link
    Symlink,
    Clause(Clause),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Symlink => f.write_str("symlink"),
            Reason::Clause(clause) => f.write_str(clause.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(Reason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    fn reject(clause: Clause) -> Self {
        Verdict::Reject(Reason::Clause(clause))
    }
}

/// Shell-style match over the whole text; `*` also crosses `/`.
/// A pattern that does not compile only matches itself literally.
fn glob_matches(pattern: &str, text: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches(text),
        Err(_) => pattern == text,
    }
}

/// Decide whether a remote folder is walked.
///
/// # Errors
/// Returns `JobError::InvalidExcludeFolders` (code 10) when `exclude_folders`
/// is present but is not a non-empty list.
pub fn evaluate_folder(
    remote_root: &Path,
    remote_path: &Path,
    options: Option<&EntryOptions>,
    overrides: &RunOverrides,
) -> Result<Verdict, JobError> {
    let Some(options) = options else {
        return Ok(Verdict::Accept);
    };

    if let Some(exclude_folders) = options
        .exclude_folders
        .as_ref()
        .filter(|_| overrides.allows(Clause::ExcludeFolders))
    {
        let patterns = exclude_folders
            .as_list()
            .ok_or_else(|| JobError::InvalidExcludeFolders {
                root: remote_root.to_path_buf(),
            })?;

        let remote = remote_path.to_string_lossy();
        for pattern in patterns {
            let resolved = if Path::new(pattern).is_absolute() {
                pattern.clone()
            } else {
                remote_root.join(pattern).to_string_lossy().into_owned()
            };
            if glob_matches(&resolved, &remote) {
                return Ok(Verdict::reject(Clause::ExcludeFolders));
            }
        }
    }

    if let (Some(group), Some(active)) = (
        options
            .group
            .as_deref()
            .filter(|_| overrides.allows(Clause::Group)),
        overrides.group_filter(),
    ) {
        if group != active {
            return Ok(Verdict::reject(Clause::Group));
        }
    }

    Ok(Verdict::Accept)
}

/// Decide whether a remote file is transferred to `local_file`.
pub fn evaluate_file(
    options: &EntryOptions,
    remote_root: &Path,
    local_file: &Path,
    remote_file: &Path,
    remote_stat: &RemoteStat,
    overrides: &RunOverrides,
) -> Verdict {
    if remote_stat.is_symlink() {
        return Verdict::Reject(Reason::Symlink);
    }

    if options.overwrite_existing == Some(false)
        && overrides.allows(Clause::OverwriteExisting)
        && local_file.exists()
    {
        return Verdict::reject(Clause::OverwriteExisting);
    }

    if options.overwrite_newer == Some(true) && overrides.allows(Clause::OverwriteNewer) {
        if let Some(local) = fs_ops::local_mtime(local_file) {
            let remote = remote_stat.mtime.map(|t| t as i64).unwrap_or(0);
            if remote <= local {
                return Verdict::reject(Clause::OverwriteNewer);
            }
        }
    }

    let remote = remote_file.to_string_lossy();

    if let Some(exclude_filter) = options
        .exclude_filter
        .as_deref()
        .filter(|_| overrides.allows(Clause::ExcludeFilter))
    {
        if !exclude_filter.is_empty() && glob_matches(exclude_filter, &remote) {
            return Verdict::reject(Clause::ExcludeFilter);
        }
    }

    if overrides.allows(Clause::IncludeFilters) {
        let included = match &options.include_filters {
            Some(Patterns::Many(list)) if !list.is_empty() => {
                list.iter().any(|p| glob_matches(p, &remote))
            }
            Some(Patterns::One(single)) if !single.is_empty() => glob_matches(single, &remote),
            _ => true,
        };
        if !included {
            return Verdict::reject(Clause::IncludeFilters);
        }
    }

    if overrides.allows(Clause::ExcludeFiles) {
        let excluded: &[String] = match &options.exclude_files {
            Some(Patterns::Many(list)) => list,
            Some(Patterns::One(single)) => std::slice::from_ref(single),
            Some(Patterns::Invalid(_)) | None => &[],
        };
        if excluded
            .iter()
            .filter(|f| !f.is_empty())
            .any(|f| remote_root.join(f) == remote_file)
        {
            return Verdict::reject(Clause::ExcludeFiles);
        }
    }

    Verdict::Accept
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::fs;
    use std::path::PathBuf;

    fn options(json: &str) -> EntryOptions {
        serde_json::from_str(json).expect("Failed to parse options")
    }

    fn regular_file(mtime: u64) -> RemoteStat {
        RemoteStat {
            size: Some(10),
            mode: Some(0o100_644),
            atime: Some(mtime),
            mtime: Some(mtime),
        }
    }

    fn symlink() -> RemoteStat {
        RemoteStat {
            size: Some(10),
            mode: Some(0o120_777),
            atime: None,
            mtime: None,
        }
    }

    fn missing_local() -> PathBuf {
        PathBuf::from("/nonexistent/backup/target/file.bin")
    }

    fn evaluate(opts: &EntryOptions, remote_file: &str, stat: &RemoteStat) -> Verdict {
        evaluate_file(
            opts,
            Path::new("/data"),
            &missing_local(),
            Path::new(remote_file),
            stat,
            &RunOverrides::default(),
        )
    }

    #[test]
    fn test_symlink_always_rejected() {
        let opts = EntryOptions::default();
        assert_eq!(
            evaluate(&opts, "/data/link", &symlink()),
            Verdict::Reject(Reason::Symlink)
        );
    }

    #[test]
    fn test_symlink_rejection_ignores_overrides() {
        let mut ignored: Vec<&str> = Clause::ALL.iter().map(|c| c.as_str()).collect();
        ignored.push("symlink");
        let overrides = RunOverrides::new(None, ignored);

        let verdict = evaluate_file(
            &options(r#"{"include_filters": ["*"]}"#),
            Path::new("/data"),
            &missing_local(),
            Path::new("/data/link"),
            &symlink(),
            &overrides,
        );
        assert_eq!(verdict, Verdict::Reject(Reason::Symlink));
    }

    #[test]
    fn test_overwrite_existing_false_rejects_existing_local() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let local = temp_dir.path().join("a.txt");
        fs::write(&local, "old").expect("Failed to write local file");
        let opts = options(r#"{"overwrite_existing": false}"#);

        let verdict = evaluate_file(
            &opts,
            Path::new("/data"),
            &local,
            Path::new("/data/a.txt"),
            &regular_file(100),
            &RunOverrides::default(),
        );
        assert_eq!(verdict, Verdict::Reject(Reason::Clause(Clause::OverwriteExisting)));

        let overrides = RunOverrides::new(None, ["overwrite_existing"]);
        let verdict = evaluate_file(
            &opts,
            Path::new("/data"),
            &local,
            Path::new("/data/a.txt"),
            &regular_file(100),
            &overrides,
        );
        assert!(verdict.is_accept());
    }

    #[test]
    fn test_overwrite_newer_requires_strictly_newer_remote() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let local = temp_dir.path().join("a.txt");
        fs::write(&local, "old").expect("Failed to write local file");
        filetime::set_file_mtime(&local, FileTime::from_unix_time(1_000, 0))
            .expect("Failed to set mtime");
        let opts = options(r#"{"overwrite_newer": true}"#);

        let check = |remote_mtime: u64| {
            evaluate_file(
                &opts,
                Path::new("/data"),
                &local,
                Path::new("/data/a.txt"),
                &regular_file(remote_mtime),
                &RunOverrides::default(),
            )
        };

        assert!(check(1_001).is_accept());
        assert_eq!(
            check(1_000),
            Verdict::Reject(Reason::Clause(Clause::OverwriteNewer))
        );
        assert_eq!(
            check(999),
            Verdict::Reject(Reason::Clause(Clause::OverwriteNewer))
        );
    }

    #[test]
    fn test_overwrite_newer_accepts_when_no_local_copy() {
        let opts = options(r#"{"overwrite_newer": true}"#);
        assert!(evaluate(&opts, "/data/a.txt", &regular_file(5)).is_accept());
    }

    #[test]
    fn test_exclude_filter() {
        let opts = options(r#"{"exclude_filter": "*.log"}"#);
        assert_eq!(
            evaluate(&opts, "/data/app/debug.log", &regular_file(1)),
            Verdict::Reject(Reason::Clause(Clause::ExcludeFilter))
        );
        assert!(evaluate(&opts, "/data/app/debug.txt", &regular_file(1)).is_accept());

        let empty = options(r#"{"exclude_filter": ""}"#);
        assert!(evaluate(&empty, "/data/app/debug.log", &regular_file(1)).is_accept());
    }

    #[test]
    fn test_include_filters_list() {
        let opts = options(r#"{"include_filters": ["*.txt"]}"#);
        assert!(evaluate(&opts, "/data/a.txt", &regular_file(1)).is_accept());
        assert_eq!(
            evaluate(&opts, "/data/a.png", &regular_file(1)),
            Verdict::Reject(Reason::Clause(Clause::IncludeFilters))
        );
    }

    #[test]
    fn test_include_filters_single_string() {
        let opts = options(r#"{"include_filters": "*.md"}"#);
        assert!(evaluate(&opts, "/data/README.md", &regular_file(1)).is_accept());
        assert!(!evaluate(&opts, "/data/a.png", &regular_file(1)).is_accept());
    }

    #[test]
    fn test_include_filters_empty_list_places_no_restriction() {
        let opts = options(r#"{"include_filters": []}"#);
        assert!(evaluate(&opts, "/data/a.png", &regular_file(1)).is_accept());
    }

    #[test]
    fn test_exclude_files_relative_to_root() {
        let opts = options(r#"{"exclude_files": ["secrets/key.pem", ""]}"#);
        assert_eq!(
            evaluate(&opts, "/data/secrets/key.pem", &regular_file(1)),
            Verdict::Reject(Reason::Clause(Clause::ExcludeFiles))
        );
        assert!(evaluate(&opts, "/data/other/key.pem", &regular_file(1)).is_accept());
    }

    #[test]
    fn test_first_rejection_wins() {
        let opts = options(r#"{"exclude_filter": "*.txt", "include_filters": ["*.png"]}"#);
        assert_eq!(
            evaluate(&opts, "/data/a.txt", &regular_file(1)),
            Verdict::Reject(Reason::Clause(Clause::ExcludeFilter))
        );
    }

    #[test]
    fn test_exclude_folders_exact_match() {
        let opts = options(r#"{"exclude_folders": ["tmp"]}"#);
        let root = Path::new("/data");
        let overrides = RunOverrides::default();

        let tmp = evaluate_folder(root, Path::new("/data/tmp"), Some(&opts), &overrides)
            .expect("Evaluation should succeed");
        assert_eq!(tmp, Verdict::Reject(Reason::Clause(Clause::ExcludeFolders)));

        let tmp2 = evaluate_folder(root, Path::new("/data/tmp2"), Some(&opts), &overrides)
            .expect("Evaluation should succeed");
        assert!(tmp2.is_accept());
    }

    #[test]
    fn test_exclude_folders_absolute_and_glob() {
        let opts = options(r#"{"exclude_folders": ["/var/cache*"]}"#);
        let verdict = evaluate_folder(
            Path::new("/data"),
            Path::new("/var/cache-old"),
            Some(&opts),
            &RunOverrides::default(),
        )
        .expect("Evaluation should succeed");
        assert!(!verdict.is_accept());
    }

    #[test]
    fn test_exclude_folders_must_be_non_empty_list() {
        for json in [
            r#"{"exclude_folders": []}"#,
            r#"{"exclude_folders": "tmp"}"#,
            r#"{"exclude_folders": 5}"#,
            r#"{"exclude_folders": null}"#,
            r#"{"exclude_folders": ["tmp", 1]}"#,
            r#"{"exclude_folders": {"tmp": true}}"#,
        ] {
            let opts = options(json);
            let err = evaluate_folder(
                Path::new("/data"),
                Path::new("/data/tmp"),
                Some(&opts),
                &RunOverrides::default(),
            )
            .expect_err("Expected a configuration error");
            assert_eq!(err.code(), 10);
        }
    }

    #[test]
    fn test_exclude_folders_ignored_by_override() {
        let overrides = RunOverrides::new(None, ["exclude_folders"]);
        for json in [
            r#"{"exclude_folders": "not-a-list"}"#,
            r#"{"exclude_folders": 5}"#,
            r#"{"exclude_folders": null}"#,
        ] {
            let opts = options(json);
            let verdict = evaluate_folder(
                Path::new("/data"),
                Path::new("/data/tmp"),
                Some(&opts),
                &overrides,
            )
            .expect("Ignored clause must not be validated");
            assert!(verdict.is_accept());
        }
    }

    #[test]
    fn test_malformed_file_patterns_place_no_restriction() {
        let opts = options(r#"{"include_filters": 5, "exclude_files": {"a": 1}}"#);
        assert!(evaluate(&opts, "/data/a.png", &regular_file(100)).is_accept());
    }

    #[test]
    fn test_group_filter() {
        let opts = options(r#"{"group": "nightly"}"#);
        let root = Path::new("/data");
        let folder = Path::new("/data");

        let weekly = RunOverrides::new(Some("weekly".into()), Vec::<String>::new());
        assert_eq!(
            evaluate_folder(root, folder, Some(&opts), &weekly).expect("Evaluation failed"),
            Verdict::Reject(Reason::Clause(Clause::Group))
        );

        let nightly = RunOverrides::new(Some("nightly".into()), Vec::<String>::new());
        assert!(evaluate_folder(root, folder, Some(&opts), &nightly)
            .expect("Evaluation failed")
            .is_accept());

        let unset = RunOverrides::default();
        assert!(evaluate_folder(root, folder, Some(&opts), &unset)
            .expect("Evaluation failed")
            .is_accept());

        let ignored = RunOverrides::new(Some("weekly".into()), ["group"]);
        assert!(evaluate_folder(root, folder, Some(&opts), &ignored)
            .expect("Evaluation failed")
            .is_accept());
    }

    #[test]
    fn test_reason_displays_clause_name() {
        assert_eq!(Reason::Symlink.to_string(), "symlink");
        assert_eq!(
            Reason::Clause(Clause::IncludeFilters).to_string(),
            "include_filters"
        );
    }
}
