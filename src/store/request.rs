//! Typed operations over `Request` / `request.md`.

use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::io;

use super::paths;
use super::schema::Request;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create(base: &Path, plan_id: &str, original: &str) -> Result<()> {
    let path = paths::request_md(base, plan_id);
    let _lock = io::acquire_exclusive(&path, LOCK_TIMEOUT)?;
    let request = Request {
        original: original.to_string(),
        clarified_request: None,
    };
    io::write_atomic(&path, &request.to_markdown())
}

pub fn read(base: &Path, plan_id: &str) -> Result<Request> {
    let path = paths::request_md(base, plan_id);
    let _lock = io::acquire_shared(&path, LOCK_TIMEOUT)?;
    let text = io::read_to_string(&path)?;
    Ok(Request::from_markdown(&text))
}

/// `clarify` is the only mutation to an otherwise-immutable Request:
/// it sets or replaces `clarified_request` without touching `original`.
pub fn clarify(base: &Path, plan_id: &str, clarified_request: &str) -> Result<Request> {
    let path = paths::request_md(base, plan_id);
    let _lock = io::acquire_exclusive(&path, LOCK_TIMEOUT)?;
    let mut request = Request::from_markdown(&io::read_to_string(&path)?);
    request.clarified_request = Some(clarified_request.to_string());
    io::write_atomic(&path, &request.to_markdown())?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_clarify_preserves_original() {
        let dir = tempdir().unwrap();
        create(dir.path(), "add-x", "Add X").unwrap();
        clarify(dir.path(), "add-x", "Add the X feature to the settings page").unwrap();

        let request = read(dir.path(), "add-x").unwrap();
        assert_eq!(request.original, "Add X");
        assert_eq!(
            request.clarified_request.as_deref(),
            Some("Add the X feature to the settings page")
        );
    }
}
