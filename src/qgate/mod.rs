//! The Q-Gate Controller: a pure function over a phase's outputs plus
//! the request, emitting a (possibly empty) list of Findings.
//!
//! Attached to phases that produce structured artifacts consumed by later
//! phases — principally outline, and implicitly verify. The controller
//! itself never fixes anything; it only evaluates and records. The phase
//! body is responsible for addressing pending findings and
//! resolving them before the next evaluation.

use std::path::Path;

use crate::command_exec::ParsedError;
use crate::error::{Error, Result};
use crate::store::schema::{Finding, References, SolutionOutline};
use crate::store::{assessment, finding, outline, references};
use crate::types::{Certainty, FindingResolution, FindingSource};

/// Hard default for the Q-Gate re-entry cap, with configuration override
/// left as a future extension point.
pub const DEFAULT_REENTRY_CAP: u32 = 5;

/// Outcome of one gate evaluation.
#[derive(Debug, Clone)]
pub enum GateStatus {
    /// `pending_count == 0`: the phase may transition to `done`.
    Passed,
    /// `pending_count > 0`: the orchestrator re-enters the phase body.
    Pending(Vec<Finding>),
}

/// Evaluate the outline Q-Gate's standard checks against the current
/// on-disk state of `solution_outline.md`, `references.toon`, and
/// `artifacts/assessments.jsonl`. Violations are recorded via
/// `finding::add` and the phase's current
/// pending set is returned.
pub fn evaluate_outline(base: &Path, plan_id: &str) -> Result<Vec<Finding>> {
    let phase = "3-outline";
    let outline = outline::read(base, plan_id)?;
    let refs = references::read(base, plan_id)?;
    let assessments = assessment::list(base, plan_id)?;

    check_request_alignment(base, plan_id, phase, &outline)?;
    check_assessment_coverage(base, plan_id, phase, &outline, &assessments)?;
    check_no_missing_coverage(base, plan_id, phase, &outline, &assessments)?;
    check_no_profile_overlap(base, plan_id, phase, &outline)?;
    check_symmetric_file_sets(base, plan_id, phase, &outline, &refs)?;
    check_executable_verification(base, plan_id, phase, &outline)?;

    finding::pending(base, plan_id, phase)
}

/// Coarse lexical-overlap heuristic for request alignment: the core does
/// not reason about request semantics (that is an opaque agent's job), but
/// it can flag a deliverable whose title shares no significant word with
/// the clarified (or original) request text, as a cheap, deterministic
/// first pass.
fn check_request_alignment(
    base: &Path,
    plan_id: &str,
    phase: &str,
    outline: &SolutionOutline,
) -> Result<()> {
    let request = crate::store::request::read(base, plan_id)?;
    let request_text = request
        .clarified_request
        .as_deref()
        .unwrap_or(&request.original)
        .to_lowercase();
    let request_words: std::collections::HashSet<&str> = request_text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .collect();

    for deliverable in &outline.deliverables {
        let title_lower = deliverable.title.to_lowercase();
        let aligned = title_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .any(|w| request_words.contains(w));
        if !aligned && !request_words.is_empty() {
            finding::add(
                base,
                plan_id,
                phase,
                FindingSource::QGate,
                "warning",
                "request alignment",
                &format!(
                    "deliverable {} (\"{}\") shares no word with the request",
                    deliverable.number, deliverable.title
                ),
                None,
            )?;
        }
    }
    Ok(())
}

fn check_assessment_coverage(
    base: &Path,
    plan_id: &str,
    phase: &str,
    outline: &SolutionOutline,
    assessments: &[crate::store::schema::Assessment],
) -> Result<()> {
    for deliverable in &outline.deliverables {
        for file in &deliverable.affected_files {
            let latest = assessments.iter().filter(|a| &a.file_path == file).last();
            let included = latest.is_some_and(|a| a.certainty == Certainty::CertainInclude);
            let exists_on_disk = Path::new(file).exists();
            if !included || !exists_on_disk {
                finding::add(
                    base,
                    plan_id,
                    phase,
                    FindingSource::QGate,
                    "error",
                    "assessment coverage",
                    &format!(
                        "deliverable {} lists `{file}` but it lacks a CERTAIN_INCLUDE assessment or does not exist on disk",
                        deliverable.number
                    ),
                    Some(file),
                )?;
            }
        }
    }
    Ok(())
}

fn check_no_missing_coverage(
    base: &Path,
    plan_id: &str,
    phase: &str,
    outline: &SolutionOutline,
    assessments: &[crate::store::schema::Assessment],
) -> Result<()> {
    let mut latest_by_file: std::collections::BTreeMap<&str, &crate::store::schema::Assessment> =
        std::collections::BTreeMap::new();
    for a in assessments {
        latest_by_file.insert(&a.file_path, a);
    }
    for (file, assessment) in latest_by_file {
        if assessment.certainty != Certainty::CertainInclude {
            continue;
        }
        let covered = outline
            .deliverables
            .iter()
            .any(|d| d.affected_files.iter().any(|f| f == file));
        if !covered {
            finding::add(
                base,
                plan_id,
                phase,
                FindingSource::QGate,
                "error",
                "missing coverage",
                &format!("`{file}` is CERTAIN_INCLUDE but no deliverable lists it"),
                Some(file),
            )?;
        }
    }
    Ok(())
}

fn check_no_profile_overlap(base: &Path, plan_id: &str, phase: &str, outline: &SolutionOutline) -> Result<()> {
    let mut seen: std::collections::HashSet<(String, String)> = std::collections::HashSet::new();
    for deliverable in &outline.deliverables {
        for file in &deliverable.affected_files {
            for profile in &deliverable.profiles {
                let key = (file.clone(), profile.clone());
                if !seen.insert(key) {
                    finding::add(
                        base,
                        plan_id,
                        phase,
                        FindingSource::QGate,
                        "error",
                        "profile overlap",
                        &format!("`{file}` is covered by profile `{profile}` in more than one deliverable"),
                        Some(file),
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn check_symmetric_file_sets(
    base: &Path,
    plan_id: &str,
    phase: &str,
    outline: &SolutionOutline,
    refs: &References,
) -> Result<()> {
    let union = outline.affected_files_union();
    let mut expected = refs.affected_files.clone();
    expected.sort();
    expected.dedup();

    if union != expected {
        let missing_from_refs: Vec<&String> = union.iter().filter(|f| !expected.contains(f)).collect();
        let missing_from_deliverables: Vec<&String> =
            expected.iter().filter(|f| !union.contains(f)).collect();
        finding::add(
            base,
            plan_id,
            phase,
            FindingSource::QGate,
            "error",
            "symmetric file sets",
            &format!(
                "union of deliverable affected_files != references.affected_files (missing from references: {missing_from_refs:?}, missing from deliverables: {missing_from_deliverables:?})"
            ),
            None,
        )?;
    }
    Ok(())
}

fn check_executable_verification(
    base: &Path,
    plan_id: &str,
    phase: &str,
    outline: &SolutionOutline,
) -> Result<()> {
    for deliverable in &outline.deliverables {
        if deliverable.verification.command.trim().is_empty() {
            finding::add(
                base,
                plan_id,
                phase,
                FindingSource::QGate,
                "error",
                "executable verification",
                &format!("deliverable {} has an empty verification.command", deliverable.number),
                None,
            )?;
        }
    }
    Ok(())
}

/// Translate parsed command-executor errors into verify-phase
/// findings. The verify Q-Gate is implicit: every `compilation_error` or
/// `test_failure` becomes a pending finding that the verify phase body
/// turns into a FIX task.
pub fn evaluate_verify(base: &Path, plan_id: &str, parsed_errors: &[ParsedError]) -> Result<Vec<Finding>> {
    let phase = "6-verify";
    for err in parsed_errors {
        if err.category == "compilation_error" || err.category == "test_failure" {
            finding::add(
                base,
                plan_id,
                phase,
                FindingSource::QGate,
                "error",
                &err.category,
                &err.message,
                (!err.file.is_empty()).then_some(err.file.as_str()),
            )?;
        }
    }
    finding::pending(base, plan_id, phase)
}

/// Resolve every currently pending finding on `phase` with the same
/// resolution and detail. A convenience for phase bodies that address all
/// findings in one pass (e.g. a recipe-driven outline that has no findings
/// to begin with, or a bulk "accepted, moving on" resolution).
pub fn resolve_all(
    base: &Path,
    plan_id: &str,
    phase: &str,
    resolution: FindingResolution,
    detail: &str,
) -> Result<()> {
    for f in finding::pending(base, plan_id, phase)? {
        finding::resolve(base, plan_id, phase, &f.hash_id, resolution, detail)?;
    }
    Ok(())
}

/// Check the gate at re-entry `attempt` (1-based): `Passed` when nothing is
/// pending, `Pending` otherwise. Callers compare `attempt` against
/// `DEFAULT_REENTRY_CAP` (or a configured override) and raise
/// `Error::QGateUnresolved` themselves once the cap is hit, since only the
/// orchestrator (not the gate) knows the attempt count.
pub fn status(pending: Vec<Finding>) -> GateStatus {
    if pending.is_empty() {
        GateStatus::Passed
    } else {
        GateStatus::Pending(pending)
    }
}

/// Raise `QGateUnresolved` if `attempt` has reached `cap` and findings
/// remain pending.
pub fn enforce_cap(phase: &str, pending: &[Finding], attempt: u32, cap: u32) -> Result<()> {
    if !pending.is_empty() && attempt >= cap {
        return Err(Error::QGateUnresolved {
            phase: phase.to_string(),
            pending_findings: pending.len(),
            attempts: attempt,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::{Deliverable, DeliverableVerification};
    use crate::types::{ChangeType, ExecutionMode};
    use tempfile::tempdir;

    fn setup_plan(dir: &Path, plan_id: &str) {
        crate::store::plan::create(dir, plan_id).unwrap();
        crate::store::request::create(dir, plan_id, "Add the widget export button").unwrap();
        crate::store::references::create(dir, plan_id, vec!["backend".to_string()]).unwrap();
    }

    #[test]
    fn symmetric_file_sets_violation_is_recorded_and_drains_on_fix() {
        let dir = tempdir().unwrap();
        setup_plan(dir.path(), "add-x");

        let outline = SolutionOutline {
            plan_id: "add-x".to_string(),
            deliverables: vec![Deliverable {
                number: 1,
                title: "Add widget export".to_string(),
                change_type: ChangeType::Feature,
                execution_mode: ExecutionMode::Automated,
                domain: "backend".to_string(),
                module: "backend".to_string(),
                depends: vec![],
                profiles: vec!["implementation".to_string()],
                affected_files: vec!["a/b.rs".to_string()],
                change_per_file: String::new(),
                verification: DeliverableVerification {
                    command: "cargo test".to_string(),
                    criteria: "exit 0".to_string(),
                },
                success_criteria: vec![],
            }],
            ..Default::default()
        };
        crate::store::outline::write(dir.path(), "add-x", &outline).unwrap();

        let pending = evaluate_outline(dir.path(), "add-x").unwrap();
        assert!(pending.iter().any(|f| f.title == "symmetric file sets"));

        crate::store::references::update(dir.path(), "add-x", |r| {
            r.affected_files.push("a/b.rs".to_string());
        })
        .unwrap();
        crate::store::assessment::add(
            dir.path(),
            "add-x",
            "a/b.rs",
            Certainty::CertainInclude,
            90,
            "agent-1",
            "confirmed",
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/b.rs"), "").unwrap();

        for f in finding::pending(dir.path(), "add-x", "3-outline").unwrap() {
            finding::resolve(
                dir.path(),
                "add-x",
                "3-outline",
                &f.hash_id,
                FindingResolution::TakenIntoAccount,
                "fixed",
            )
            .unwrap();
        }

        let pending_after = evaluate_outline(dir.path(), "add-x").unwrap();
        assert!(pending_after.is_empty(), "expected no pending findings, got {pending_after:?}");
    }

    #[test]
    fn reentry_cap_raises_q_gate_unresolved() {
        let finding = Finding {
            hash_id: "abc".to_string(),
            phase: "3-outline".to_string(),
            source: FindingSource::QGate,
            severity: "error".to_string(),
            title: "x".to_string(),
            detail: "y".to_string(),
            file_path: None,
            resolution: FindingResolution::Pending,
            resolution_detail: None,
            recorded_at: chrono::Utc::now(),
        };
        assert!(enforce_cap("3-outline", &[finding.clone()], 4, DEFAULT_REENTRY_CAP).is_ok());
        let err = enforce_cap("3-outline", &[finding], 5, DEFAULT_REENTRY_CAP).unwrap_err();
        assert!(matches!(err, Error::QGateUnresolved { .. }));
    }
}
