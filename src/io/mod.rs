//! Filesystem primitives backing the Artifact Store: atomic full-file
//! rewrites, append-only line writes, and per-document locking.

pub mod atomic;
pub mod lock;

pub use atomic::{append_line, read_to_string, write_atomic};
pub use lock::{DocumentLock, acquire_exclusive, acquire_shared};
