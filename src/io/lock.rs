//! Per-document advisory file locks.
//!
//! Writers take an exclusive lock on a document's lock file; readers take a
//! shared lock. Both are bounded: if the lock cannot be acquired before the
//! timeout, callers get `Error::LockTimeout` rather than blocking forever —
//! the caller decides whether to retry via [`crate::retry`].

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A held lock on a document. Dropping it releases the lock.
pub struct DocumentLock {
    file: File,
    document: String,
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path_for(document_path: &Path) -> PathBuf {
    let file_name = document_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    document_path.with_file_name(format!(".{file_name}.lock"))
}

fn open_lock_file(document_path: &Path) -> Result<File> {
    let lock_path = lock_path_for(document_path);
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| Error::Io {
            path: lock_path,
            source: e,
        })
}

/// Acquire an exclusive lock on the document at `document_path`, polling
/// until `timeout` elapses.
pub fn acquire_exclusive(document_path: &Path, timeout: Duration) -> Result<DocumentLock> {
    let file = open_lock_file(document_path)?;
    let started = Instant::now();

    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                return Ok(DocumentLock {
                    file,
                    document: document_path.display().to_string(),
                });
            }
            Err(_) if started.elapsed() < timeout => std::thread::sleep(POLL_INTERVAL),
            Err(_) => {
                return Err(Error::LockTimeout {
                    document: document_path.display().to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
    }
}

/// Acquire a shared (read) lock on the document at `document_path`.
pub fn acquire_shared(document_path: &Path, timeout: Duration) -> Result<DocumentLock> {
    let file = open_lock_file(document_path)?;
    let started = Instant::now();

    loop {
        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                return Ok(DocumentLock {
                    file,
                    document: document_path.display().to_string(),
                });
            }
            Err(_) if started.elapsed() < timeout => std::thread::sleep(POLL_INTERVAL),
            Err(_) => {
                return Err(Error::LockTimeout {
                    document: document_path.display().to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
    }
}

impl DocumentLock {
    pub fn document(&self) -> &str {
        &self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn exclusive_lock_can_be_acquired_and_released() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("status.toon");
        std::fs::write(&doc, "").unwrap();

        let lock = acquire_exclusive(&doc, Duration::from_millis(500)).unwrap();
        drop(lock);

        // A second exclusive acquisition should succeed promptly once released.
        acquire_exclusive(&doc, Duration::from_millis(500)).unwrap();
    }

    #[test]
    fn second_exclusive_lock_times_out_while_first_is_held() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("status.toon");
        std::fs::write(&doc, "").unwrap();

        let _held = acquire_exclusive(&doc, Duration::from_millis(500)).unwrap();
        let err = acquire_exclusive(&doc, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, Error::LockTimeout { .. }));
    }
}
