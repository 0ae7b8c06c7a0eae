//! Typed operations over `Plan` / `status.toon`.

use std::path::Path;
use std::time::Duration;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::io;
use crate::types::{Phase, PhaseStatus};

use super::paths;
use super::schema::Plan;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a new plan directory and its `status.toon`. Returns
/// `AlreadyExists` without touching the existing plan.
#[instrument(skip_all, fields(plan_id = %plan_id))]
pub fn create(base: &Path, plan_id: &str) -> Result<Plan> {
    if !paths::is_valid_plan_id(plan_id) {
        return Err(Error::InvalidInput {
            field: "plan_id".to_string(),
            reason: format!("`{plan_id}` does not match ^[a-z][a-z0-9-]+$"),
        });
    }
    if exists(base, plan_id) {
        return Err(Error::AlreadyExists(plan_id.to_string()));
    }

    let plan = Plan::new(plan_id);
    let status_path = paths::status_toon(base, plan_id);
    let _lock = io::acquire_exclusive(&status_path, LOCK_TIMEOUT)?;
    io::write_atomic(&status_path, &plan.to_toon())?;
    tracing::info!(plan_id, "plan created");
    Ok(plan)
}

pub fn exists(base: &Path, plan_id: &str) -> bool {
    paths::status_toon(base, plan_id).is_file()
}

pub fn read(base: &Path, plan_id: &str) -> Result<Plan> {
    let status_path = paths::status_toon(base, plan_id);
    let _lock = io::acquire_shared(&status_path, LOCK_TIMEOUT)?;
    let text = io::read_to_string(&status_path)?;
    Plan::from_toon(&text)
}

pub fn list(base: &Path) -> Result<Vec<String>> {
    let root = paths::plans_root(base);
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in walkdir::WalkDir::new(&root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Other(e.to_string()))?;
        if entry.file_type().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                ids.push(name.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}

/// Declared phase-transition DAG: only these moves are legal.
fn transition_is_legal(from: PhaseStatus, to: PhaseStatus) -> bool {
    use PhaseStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress)
            | (InProgress, InProgress)
            | (InProgress, Done)
            | (InProgress, Failed)
            | (InProgress, Skipped)
            | (Done, InProgress) // explicit user re-open only; caller enforces intent
    )
}

/// Move `phase` to `to`, enforcing the legal phase-transition DAG.
#[instrument(skip_all, fields(plan_id = %plan_id, phase = phase.as_str(), to = to.as_str()))]
pub fn transition(base: &Path, plan_id: &str, phase: Phase, to: PhaseStatus) -> Result<Plan> {
    let status_path = paths::status_toon(base, plan_id);
    let _lock = io::acquire_exclusive(&status_path, LOCK_TIMEOUT)?;
    let text = io::read_to_string(&status_path)?;
    let mut plan = Plan::from_toon(&text)?;

    let from = plan.status_of(phase);
    if !transition_is_legal(from, to) {
        return Err(Error::InvariantViolation(format!(
            "illegal phase transition for {}: {from:?} -> {to:?}",
            phase.as_str()
        )));
    }

    if from == PhaseStatus::Pending && to == PhaseStatus::InProgress {
        for earlier in Phase::all().into_iter().take(phase.ordinal()) {
            if !plan.status_of(earlier).is_settled() {
                return Err(Error::InvariantViolation(format!(
                    "{} cannot enter in_progress while {} is still {:?}",
                    phase.as_str(),
                    earlier.as_str(),
                    plan.status_of(earlier)
                )));
            }
        }
    }

    plan.set_status(phase, to);
    if !plan.at_most_one_in_progress() {
        return Err(Error::InvariantViolation(
            "transition would leave more than one phase in_progress".to_string(),
        ));
    }

    io::write_atomic(&status_path, &plan.to_toon())?;
    tracing::info!(plan_id, phase = phase.as_str(), status = to.as_str(), "phase transitioned");
    Ok(plan)
}
