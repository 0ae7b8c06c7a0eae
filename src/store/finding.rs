//! Append-only operations over `Finding` / `qgate/<phase>.jsonl`.

use std::path::Path;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::io;
use crate::types::{FindingResolution, FindingSource};

use super::paths;
use super::schema::Finding;

/// Append a finding, unless a finding with the same `hash_id` is already
/// pending on this phase — `add` is idempotent per hash, so re-running
/// the same Q-Gate check twice does not multiply findings.
pub fn add(
    base: &Path,
    plan_id: &str,
    phase: &str,
    source: FindingSource,
    severity: &str,
    title: &str,
    detail: &str,
    file_path: Option<&str>,
) -> Result<Finding> {
    let hash_id = Finding::compute_hash_id(phase, title, file_path, detail);

    let existing = list(base, plan_id, phase)?;
    if let Some(dup) = existing
        .iter()
        .find(|f| f.hash_id == hash_id && f.resolution.is_open())
    {
        return Ok(dup.clone());
    }

    let finding = Finding {
        hash_id,
        phase: phase.to_string(),
        source,
        severity: severity.to_string(),
        title: title.to_string(),
        detail: detail.to_string(),
        file_path: file_path.map(str::to_string),
        resolution: FindingResolution::Pending,
        resolution_detail: None,
        recorded_at: Utc::now(),
    };
    let line = serde_json::to_string(&finding).map_err(|e| Error::Serialization {
        what: "finding".to_string(),
        source: e,
    })?;
    io::append_line(&paths::qgate_phase_jsonl(base, plan_id, phase), &line)?;
    Ok(finding)
}

/// Resolve the finding matching `hash_id` by appending a resolved copy.
/// Resolution status is derived from the *latest* entry per `hash_id` —
/// the log is append-only, so a resolution is a new row, not an edit.
pub fn resolve(
    base: &Path,
    plan_id: &str,
    phase: &str,
    hash_id: &str,
    resolution: FindingResolution,
    resolution_detail: &str,
) -> Result<Finding> {
    let existing = list(base, plan_id, phase)?;
    let mut finding = existing
        .into_iter()
        .find(|f| f.hash_id == hash_id)
        .ok_or_else(|| Error::NotFound(format!("finding {hash_id} on phase {phase}")))?;

    finding.resolution = resolution;
    finding.resolution_detail = Some(resolution_detail.to_string());
    finding.recorded_at = Utc::now();

    let line = serde_json::to_string(&finding).map_err(|e| Error::Serialization {
        what: "finding".to_string(),
        source: e,
    })?;
    io::append_line(&paths::qgate_phase_jsonl(base, plan_id, phase), &line)?;
    Ok(finding)
}

/// All recorded rows for `phase`, in append order (later rows for the same
/// `hash_id` represent resolution updates).
pub fn list(base: &Path, plan_id: &str, phase: &str) -> Result<Vec<Finding>> {
    let path = paths::qgate_phase_jsonl(base, plan_id, phase);
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let text = io::read_to_string(&path)?;
    text.lines()
        .map(|line| {
            serde_json::from_str(line).map_err(|e| Error::Serialization {
                what: "finding".to_string(),
                source: e,
            })
        })
        .collect()
}

/// The current (latest-per-hash) set of findings still pending.
pub fn pending(base: &Path, plan_id: &str, phase: &str) -> Result<Vec<Finding>> {
    let all = list(base, plan_id, phase)?;
    let mut latest: std::collections::BTreeMap<String, Finding> = std::collections::BTreeMap::new();
    for finding in all {
        latest.insert(finding.hash_id.clone(), finding);
    }
    Ok(latest
        .into_values()
        .filter(|f| f.resolution.is_open())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn re_adding_same_finding_is_idempotent() {
        let dir = tempdir().unwrap();
        let first = add(
            dir.path(),
            "add-x",
            "3-outline",
            FindingSource::QGate,
            "error",
            "symmetric file sets",
            "missing a/b.x",
            Some("a/b.x"),
        )
        .unwrap();
        let second = add(
            dir.path(),
            "add-x",
            "3-outline",
            FindingSource::QGate,
            "error",
            "symmetric file sets",
            "missing a/b.x",
            Some("a/b.x"),
        )
        .unwrap();

        assert_eq!(first.hash_id, second.hash_id);
        assert_eq!(pending(dir.path(), "add-x", "3-outline").unwrap().len(), 1);
    }

    #[test]
    fn resolving_a_finding_drains_pending() {
        let dir = tempdir().unwrap();
        let finding = add(
            dir.path(),
            "add-x",
            "3-outline",
            FindingSource::QGate,
            "error",
            "symmetric file sets",
            "missing a/b.x",
            Some("a/b.x"),
        )
        .unwrap();

        resolve(
            dir.path(),
            "add-x",
            "3-outline",
            &finding.hash_id,
            FindingResolution::TakenIntoAccount,
            "added a/b.x to references",
        )
        .unwrap();

        assert!(pending(dir.path(), "add-x", "3-outline").unwrap().is_empty());
    }
}
