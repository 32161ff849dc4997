//! Local filesystem operations.
//!
//! This module provides the local half of a transfer:
//! - Creating mirror directories recursively
//! - Reading the modification time of an existing local copy
//! - Copying remote access/modification times onto a local file
//! - Formatting byte counts for log output

use crate::error::JobError;
use crate::remote::RemoteStat;
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;

/// Ensure `dir` exists as a directory, creating missing parents.
///
/// Returns `true` when the directory had to be created.
///
/// # Errors
/// Returns `JobError::Unclassified` if the path exists but is not a
/// directory, or if creation fails.
pub fn ensure_dir_exists(dir: &Path) -> Result<bool, JobError> {
    if dir.as_os_str().is_empty() {
        return Ok(false);
    }

    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(false),
        Ok(_) => Err(JobError::Unclassified {
            path: dir.to_path_buf(),
            message: "path exists but is not a directory".to_string(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| JobError::Unclassified {
                path: dir.to_path_buf(),
                message: format!("failed to create directory: {e}"),
            })?;
            Ok(true)
        }
        Err(e) => Err(JobError::Unclassified {
            path: dir.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

/// Modification time of an existing local file, in whole seconds since the
/// Unix epoch. `None` when the file does not exist or cannot be read.
pub fn local_mtime(path: &Path) -> Option<i64> {
    let metadata = fs::symlink_metadata(path).ok()?;
    Some(FileTime::from_last_modification_time(&metadata).unix_seconds())
}

/// Set the local file's access and modification times to the remote node's.
///
/// Missing remote times leave the corresponding local time unchanged.
pub fn copy_remote_times(local: &Path, remote: &RemoteStat) -> io::Result<()> {
    let metadata = fs::metadata(local)?;
    let atime = remote
        .atime
        .map(|t| FileTime::from_unix_time(t as i64, 0))
        .unwrap_or_else(|| FileTime::from_last_access_time(&metadata));
    let mtime = remote
        .mtime
        .map(|t| FileTime::from_unix_time(t as i64, 0))
        .unwrap_or_else(|| FileTime::from_last_modification_time(&metadata));
    filetime::set_file_times(local, atime, mtime)
}

/// Human-readable size with base-1024 units, e.g. `1.5 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ensure_dir_exists_creates_nested() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("a").join("b").join("c");

        assert!(ensure_dir_exists(&path).expect("Failed to create dirs"));
        assert!(path.is_dir());

        // Second call is a no-op
        assert!(!ensure_dir_exists(&path).expect("Failed on existing dir"));
    }

    #[test]
    fn test_ensure_dir_exists_rejects_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("file.txt");
        fs::File::create(&path).expect("Failed to create file");

        let err = ensure_dir_exists(&path).expect_err("Expected a file to be rejected");
        assert_eq!(err.code(), 1);
    }

    #[test]
    fn test_local_mtime_missing_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        assert_eq!(local_mtime(&temp_dir.path().join("missing")), None);
    }

    #[test]
    fn test_copy_remote_times() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("copy.txt");
        let mut file = fs::File::create(&path).expect("Failed to create file");
        file.write_all(b"data").expect("Failed to write file");
        drop(file);

        let remote = RemoteStat {
            size: Some(4),
            mode: Some(0o100_644),
            atime: Some(1_500_000_000),
            mtime: Some(1_400_000_000),
        };
        copy_remote_times(&path, &remote).expect("Failed to set times");

        assert_eq!(local_mtime(&path), Some(1_400_000_000));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }
}
