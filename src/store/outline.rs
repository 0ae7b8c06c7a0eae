//! Typed operations over `SolutionOutline` / `solution_outline.md`.

use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::io;

use super::paths;
use super::schema::SolutionOutline;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn exists(base: &Path, plan_id: &str) -> bool {
    paths::solution_outline_md(base, plan_id).is_file()
}

pub fn write(base: &Path, plan_id: &str, outline: &SolutionOutline) -> Result<()> {
    let path = paths::solution_outline_md(base, plan_id);
    let _lock = io::acquire_exclusive(&path, LOCK_TIMEOUT)?;
    io::write_atomic(&path, &outline.to_markdown())
}

pub fn read(base: &Path, plan_id: &str) -> Result<SolutionOutline> {
    let path = paths::solution_outline_md(base, plan_id);
    let _lock = io::acquire_shared(&path, LOCK_TIMEOUT)?;
    SolutionOutline::from_markdown(&io::read_to_string(&path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::{Deliverable, DeliverableVerification};
    use crate::types::{ChangeType, ExecutionMode};
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let outline = SolutionOutline {
            plan_id: "add-x".to_string(),
            deliverables: vec![Deliverable {
                number: 1,
                title: "Add endpoint".to_string(),
                change_type: ChangeType::Feature,
                execution_mode: ExecutionMode::Automated,
                domain: "backend".to_string(),
                module: "api".to_string(),
                depends: vec![],
                profiles: vec!["implementation".to_string()],
                affected_files: vec!["src/api.rs".to_string()],
                change_per_file: String::new(),
                verification: DeliverableVerification::default(),
                success_criteria: vec![],
            }],
            ..Default::default()
        };

        write(dir.path(), "add-x", &outline).unwrap();
        assert!(exists(dir.path(), "add-x"));
        let parsed = read(dir.path(), "add-x").unwrap();
        assert_eq!(parsed.deliverables[0].title, "Add endpoint");
    }
}
