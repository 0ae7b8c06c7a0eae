//! Atomic full-file rewrite for artifact-store documents.
//!
//! Every write goes through the temp-file + fsync + rename pattern: write
//! the new content to a sibling temp file, `fsync` it for durability,
//! then `rename` it onto the destination. POSIX rename within one
//! filesystem is atomic, so a concurrent reader never observes a partial
//! write.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a whole file to a string. Returns `Error::NotFound` if absent.
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.display().to_string())
        } else {
            io_err(path, e)
        }
    })
}

/// Write `content` to `path` atomically, creating parent directories if
/// needed. A temp file named `.<filename>.tmp` is used so the rename
/// target and the temp file always share a filesystem.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    let temp_path = temp_path_for(path);
    let mut file = std::fs::File::create(&temp_path).map_err(|e| io_err(&temp_path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| io_err(&temp_path, e))?;
    file.sync_all().map_err(|e| io_err(&temp_path, e))?;
    drop(file);

    std::fs::rename(&temp_path, path).map_err(|e| io_err(path, e))
}

/// Append a line to `path`, creating the file (and parents) if absent.
/// Used for append-only streams (logs, `qgate/<phase>.jsonl`,
/// `artifacts/assessments.jsonl`) where a full atomic rewrite per entry
/// would be wasteful; the file is opened in append mode and flushed
/// before returning.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    writeln!(file, "{line}").map_err(|e| io_err(path, e))?;
    file.sync_all().map_err(|e| io_err(path, e))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.toon");
        write_atomic(&path, "plan_id: add-x\n").unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "plan_id: add-x\n");
    }

    #[test]
    fn write_atomic_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("status.toon");
        write_atomic(&path, "a: b\n").unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempdir().unwrap();
        let err = read_to_string(&dir.path().join("missing.toon")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn append_line_creates_file_and_accumulates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qgate").join("3-outline.jsonl");
        append_line(&path, "{\"a\":1}").unwrap();
        append_line(&path, "{\"a\":2}").unwrap();
        let content = read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
