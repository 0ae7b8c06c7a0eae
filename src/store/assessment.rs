//! Append-only operations over `Assessment` / `artifacts/assessments.jsonl`.

use std::path::Path;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::io;
use crate::types::Certainty;

use super::paths;
use super::schema::Assessment;

/// Append a new assessment record. Later entries supersede earlier ones for
/// the same `file_path`; the log itself is never rewritten.
pub fn add(
    base: &Path,
    plan_id: &str,
    file_path: &str,
    certainty: Certainty,
    confidence: u8,
    agent: &str,
    detail: &str,
) -> Result<Assessment> {
    let assessment = Assessment {
        file_path: file_path.to_string(),
        certainty,
        confidence,
        agent: agent.to_string(),
        detail: detail.to_string(),
        recorded_at: Utc::now(),
    };
    let line = serde_json::to_string(&assessment).map_err(|e| Error::Serialization {
        what: "assessment".to_string(),
        source: e,
    })?;
    io::append_line(&paths::assessments_jsonl(base, plan_id), &line)?;
    Ok(assessment)
}

/// All recorded assessments, in append order.
pub fn list(base: &Path, plan_id: &str) -> Result<Vec<Assessment>> {
    let path = paths::assessments_jsonl(base, plan_id);
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let text = io::read_to_string(&path)?;
    text.lines()
        .map(|line| {
            serde_json::from_str(line).map_err(|e| Error::Serialization {
                what: "assessment".to_string(),
                source: e,
            })
        })
        .collect()
}

/// The latest assessment for `file_path`, if any has ever been recorded.
pub fn latest_for(base: &Path, plan_id: &str, file_path: &str) -> Result<Option<Assessment>> {
    Ok(list(base, plan_id)?
        .into_iter()
        .filter(|a| a.file_path == file_path)
        .last())
}
