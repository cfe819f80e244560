//! Log-file helpers.
//!
//! The adapter's stdout carries the DAP stream, so diagnostics go to a
//! file. The `tracing-subscriber` setup itself lives in the binary crate.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::paths::PlatformPaths;

/// Size at which the current log file is rotated (10 MiB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// File name of the adapter log inside the log directory.
pub const LOG_FILE_NAME: &str = "mayadap.log";

/// Return the default log file path under the platform log directory.
pub fn default_log_file_path(paths: &dyn PlatformPaths) -> PathBuf {
    paths.log_dir().join(LOG_FILE_NAME)
}

/// Ensure the parent directory of a log file exists.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Rotate log files when the current file exceeds `max_size` bytes.
///
/// ```text
///   mayadap.log   -> mayadap.log.1
///   mayadap.log.1 -> mayadap.log.2
///   ...
///   mayadap.log.<max_files> is deleted
/// ```
///
/// Does nothing when the file does not exist or is smaller than `max_size`.
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    if !log_path.exists() {
        return Ok(());
    }
    if fs::metadata(log_path)?.len() < max_size {
        return Ok(());
    }

    tracing::debug!(path = %log_path.display(), "rotating log file");
    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }

    fs::rename(log_path, rotated_path(log_path, 1))
}

/// Prepare and open the log file for appending: creates the directory,
/// rotates an oversized file, then opens (or creates) `log_path`.
pub fn open_log_file(log_path: &Path) -> io::Result<File> {
    ensure_log_dir(log_path)?;
    rotate_log_files(log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES)?;
    OpenOptions::new().create(true).append(true).open(log_path)
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}.{}", name, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::DefaultPaths;
    use std::io::Write;

    #[test]
    fn default_log_file_path_is_in_log_dir() {
        let paths = DefaultPaths::with_home("/home/tester");
        let path = default_log_file_path(&paths);
        assert_eq!(path, paths.log_dir().join("mayadap.log"));
        assert!(path.extension().is_some_and(|e| e == "log"));
    }

    #[test]
    fn rotated_path_appends_index() {
        let base = Path::new("/tmp/mayadap.log");
        assert_eq!(rotated_path(base, 1), PathBuf::from("/tmp/mayadap.log.1"));
        assert_eq!(rotated_path(base, 4), PathBuf::from("/tmp/mayadap.log.4"));
    }

    #[test]
    fn rotate_no_op_when_file_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("mayadap.log");
        assert!(rotate_log_files(&log, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES).is_ok());
    }

    #[test]
    fn rotate_keeps_small_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("mayadap.log");
        fs::write(&log, "small").unwrap();
        rotate_log_files(&log, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES).unwrap();
        assert!(log.exists());
    }

    #[test]
    fn rotate_cascades_and_drops_oldest() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("mayadap.log");
        fs::write(dir.path().join("mayadap.log.1"), "old1").unwrap();
        fs::write(dir.path().join("mayadap.log.2"), "old2").unwrap();
        fs::write(&log, "x".repeat(200)).unwrap();

        rotate_log_files(&log, 50, 2).unwrap();

        assert!(!log.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("mayadap.log.1")).unwrap(),
            "x".repeat(200)
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("mayadap.log.2")).unwrap(),
            "old1"
        );
        assert!(!dir.path().join("mayadap.log.3").exists());
    }

    #[test]
    fn open_log_file_creates_parents_and_appends() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("nested").join("logs").join("mayadap.log");

        let mut file = open_log_file(&log).unwrap();
        writeln!(file, "first").unwrap();
        drop(file);
        let mut file = open_log_file(&log).unwrap();
        writeln!(file, "second").unwrap();
        drop(file);

        assert_eq!(fs::read_to_string(&log).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn ensure_log_dir_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("sub").join("mayadap.log");
        ensure_log_dir(&log).unwrap();
        ensure_log_dir(&log).unwrap();
        assert!(dir.path().join("sub").exists());
    }
}
