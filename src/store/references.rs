//! Typed operations over `References` / `references.toon`.

use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::io;

use super::paths;
use super::schema::References;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create(base: &Path, plan_id: &str, domains: Vec<String>) -> Result<()> {
    let path = paths::references_toon(base, plan_id);
    let _lock = io::acquire_exclusive(&path, LOCK_TIMEOUT)?;
    let refs = References {
        domains,
        ..Default::default()
    };
    io::write_atomic(&path, &refs.to_toon())
}

pub fn read(base: &Path, plan_id: &str) -> Result<References> {
    let path = paths::references_toon(base, plan_id);
    let _lock = io::acquire_shared(&path, LOCK_TIMEOUT)?;
    References::from_toon(&io::read_to_string(&path)?)
}

/// Read-modify-write under the document's exclusive lock.
pub fn update(base: &Path, plan_id: &str, f: impl FnOnce(&mut References)) -> Result<References> {
    let path = paths::references_toon(base, plan_id);
    let _lock = io::acquire_exclusive(&path, LOCK_TIMEOUT)?;
    let mut refs = References::from_toon(&io::read_to_string(&path)?)?;
    f(&mut refs);
    io::write_atomic(&path, &refs.to_toon())?;
    Ok(refs)
}
