//! The Phase State Machine: enforces the seven-phase lifecycle's
//! ordering, Q-Gate re-entry, and the single mandatory user-approval gate.
//!
//! This module is the orchestrator everything else is wired into: it owns
//! no storage of its own, calling through to [`crate::store::plan`] for
//! transitions, [`crate::qgate`] for gate evaluation, [`crate::planner`] for
//! task expansion, and [`crate::command_exec`] for running verification.

use std::path::Path;

use crate::capability::CapabilityResolver;
use crate::command_exec::{self, OutputMode};
use crate::error::{Error, Result};
use crate::logging;
use crate::planner;
use crate::qgate;
use crate::store::schema::{Finding, Plan, Task};
use crate::store::{self, task as task_store};
use crate::timeout_store;
use crate::types::{LogLevel, Phase, PhaseStatus, TaskOrigin, TaskStatus, TaskType, WorkLogCategory};

/// Bounded retry for a single Execute-phase task before it is marked
/// `blocked` rather than looped on forever.
pub const DEFAULT_EXECUTE_RETRY_CAP: u32 = 3;
/// Bounded fix-iteration count for the Verify phase's implicit Q-Gate
/// before it surfaces as `QGateUnresolved`.
pub const DEFAULT_VERIFY_FIX_CAP: u32 = 5;

/// What happened when the orchestrator tried to close out a phase.
#[derive(Debug)]
pub enum PhaseOutcome {
    /// The phase transitioned to `done`.
    Done(Plan),
    /// A Q-Gate evaluation left findings pending; the phase body must
    /// address them and call this again.
    AwaitingQGate(Vec<Finding>),
    /// The phase's Q-Gate is clear, but it also requires the one mandatory
    /// user-approval step before it may close.
    AwaitingUserApproval,
}

/// Move `phase` from `pending` to `in_progress`.
pub fn enter(base: &Path, plan_id: &str, phase: Phase) -> Result<Plan> {
    logging::work(
        base,
        Some(plan_id),
        LogLevel::Info,
        WorkLogCategory::Status,
        phase.as_str(),
        &format!("entering {}", phase.display_name()),
    )?;
    store::plan::transition(base, plan_id, phase, PhaseStatus::InProgress)
}

/// Attempt to close `phase`: evaluate its Q-Gate (if it has one), and — for
/// `outline` — require the explicit approval step before transitioning to
/// `done`. Phases without a Q-Gate transition unconditionally.
pub fn try_close(base: &Path, plan_id: &str, phase: Phase) -> Result<PhaseOutcome> {
    if phase.has_q_gate() {
        let pending = match phase {
            Phase::Outline => qgate::evaluate_outline(base, plan_id)?,
            // The Verify phase's gate is driven by `run_verify_phase`, which
            // folds command output into findings itself; by the time a
            // caller reaches `try_close` for Verify the fix loop has
            // already drained it or given up.
            _ => store::finding::pending(base, plan_id, phase.as_str())?,
        };
        if !pending.is_empty() {
            return Ok(PhaseOutcome::AwaitingQGate(pending));
        }
        if phase.requires_user_approval() {
            return Ok(PhaseOutcome::AwaitingUserApproval);
        }
    }
    let plan = store::plan::transition(base, plan_id, phase, PhaseStatus::Done)?;
    logging::decision(
        base,
        Some(plan_id),
        LogLevel::Info,
        phase.as_str(),
        &format!("{} closed", phase.display_name()),
    )?;
    Ok(PhaseOutcome::Done(plan))
}

/// The one mandatory user-approval gate: closes `outline` once its
/// Q-Gate is clear and a human has explicitly signed off. `attempt` is the
/// caller's re-entry counter, enforced against [`qgate::DEFAULT_REENTRY_CAP`].
pub fn approve_outline(base: &Path, plan_id: &str, attempt: u32) -> Result<Plan> {
    let pending = qgate::evaluate_outline(base, plan_id)?;
    qgate::enforce_cap(Phase::Outline.as_str(), &pending, attempt, qgate::DEFAULT_REENTRY_CAP)?;
    if !pending.is_empty() {
        return Err(Error::QGateUnresolved {
            phase: Phase::Outline.as_str().to_string(),
            pending_findings: pending.len(),
            attempts: attempt,
        });
    }
    logging::decision(
        base,
        Some(plan_id),
        LogLevel::Info,
        "outline",
        "user approved solution outline",
    )?;
    store::plan::transition(base, plan_id, Phase::Outline, PhaseStatus::Done)
}

/// Run the Plan phase body: expand the approved outline into a task DAG.
pub fn run_plan_phase(base: &Path, plan_id: &str, capability: &CapabilityResolver) -> Result<Vec<Task>> {
    enter(base, plan_id, Phase::Plan)?;
    let tasks = planner::expand_plan(base, plan_id, capability)?;
    logging::work(
        base,
        Some(plan_id),
        LogLevel::Info,
        WorkLogCategory::Artifact,
        "plan",
        &format!("expanded {} task(s)", tasks.len()),
    )?;
    store::plan::transition(base, plan_id, Phase::Plan, PhaseStatus::Done)?;
    Ok(tasks)
}

/// Run the Execute phase body: walk the task DAG layer by layer, running
/// each automated task's verification command with the Adaptive Timeout
/// Store's current estimate, retrying up to `retry_cap` times before
/// marking the task `blocked`.
pub fn run_execute_phase(
    base: &Path,
    plan_id: &str,
    working_dir: &Path,
    retry_cap: u32,
) -> Result<Vec<Task>> {
    enter(base, plan_id, Phase::Execute)?;
    let tasks = task_store::list(base, plan_id)?;
    let layers = planner::topological_layers(&tasks)?;

    let mut results = Vec::new();
    for group in layers {
        for number in group.task_numbers {
            let task = task_store::read(base, plan_id, number)?;
            if task.verification.manual {
                // Manual tasks have no command to run; they wait for an
                // explicit human transition and are left untouched here.
                results.push(task);
                continue;
            }
            let settled = run_task_with_retry(base, plan_id, working_dir, &task, retry_cap)?;
            results.push(settled);
        }
    }

    let all_settled = results
        .iter()
        .all(|t| t.status == TaskStatus::Done || t.verification.manual);
    if all_settled {
        store::plan::transition(base, plan_id, Phase::Execute, PhaseStatus::Done)?;
    } else {
        store::plan::transition(base, plan_id, Phase::Execute, PhaseStatus::Failed)?;
    }
    Ok(results)
}

fn run_task_with_retry(
    base: &Path,
    plan_id: &str,
    working_dir: &Path,
    task: &Task,
    retry_cap: u32,
) -> Result<Task> {
    let command_key = format!("task:{}", task.number);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let timeout = timeout_store::get(base, &command_key, 300)?;
        let mut last_result = None;
        for command in &task.verification.commands {
            let mut parts = command.split_whitespace();
            let Some(program) = parts.next() else { continue };
            let args: Vec<String> = parts.map(str::to_string).collect();
            let log_path = store::paths::work_log(base, plan_id);
            let result = command_exec::run(
                program,
                &args,
                &std::collections::HashMap::new(),
                working_dir,
                timeout,
                &log_path,
                "generic",
            )?;
            timeout_store::set(
                base,
                &command_key,
                result.duration_seconds,
                match result.status {
                    command_exec::RunStatus::Success => "success",
                    command_exec::RunStatus::Error => "error",
                    command_exec::RunStatus::Timeout => "timeout",
                },
            )?;
            last_result = Some(result);
        }

        let succeeded = last_result
            .as_ref()
            .is_none_or(|r| r.status == command_exec::RunStatus::Success);

        if succeeded {
            for step in 0..task.steps.len() {
                task_store::update(base, plan_id, task.number, |t| {
                    t.steps[step].status = crate::types::StepStatus::Done;
                })?;
            }
            return task_store::transition(base, plan_id, task.number, TaskStatus::Done, true);
        }

        if attempt >= retry_cap {
            logging::decision(
                base,
                Some(plan_id),
                LogLevel::Warn,
                "execute",
                &format!("TASK-{:03} blocked after {attempt} attempt(s)", task.number),
            )?;
            return task_store::update(base, plan_id, task.number, |t| {
                t.status = TaskStatus::Blocked;
            });
        }
    }
}

/// Run the Verify phase body: execute every deliverable's verification
/// command, translate parsed errors into findings, and spin up `FIX` tasks
/// for a bounded number of re-entries before surfacing
/// `QGateUnresolved`.
pub fn run_verify_phase(
    base: &Path,
    plan_id: &str,
    working_dir: &Path,
    fix_cap: u32,
) -> Result<Vec<Finding>> {
    enter(base, plan_id, Phase::Verify)?;
    let solution_outline = store::outline::read(base, plan_id)?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut all_parsed = Vec::new();
        for deliverable in &solution_outline.deliverables {
            let command_key = format!("verify:deliverable:{}", deliverable.number);
            let timeout = timeout_store::get(base, &command_key, 600)?;
            let mut parts = deliverable.verification.command.split_whitespace();
            let Some(program) = parts.next() else { continue };
            let args: Vec<String> = parts.map(str::to_string).collect();
            let log_path = store::paths::work_log(base, plan_id);
            let result = command_exec::run(
                program,
                &args,
                &std::collections::HashMap::new(),
                working_dir,
                timeout,
                &log_path,
                "generic",
            )?;
            timeout_store::set(
                base,
                &command_key,
                result.duration_seconds,
                match result.status {
                    command_exec::RunStatus::Success => "success",
                    command_exec::RunStatus::Error => "error",
                    command_exec::RunStatus::Timeout => "timeout",
                },
            )?;
            all_parsed.extend(result.parsed_errors);
        }

        let pending = qgate::evaluate_verify(base, plan_id, &all_parsed)?;
        if pending.is_empty() {
            store::plan::transition(base, plan_id, Phase::Verify, PhaseStatus::Done)?;
            return Ok(pending);
        }

        qgate::enforce_cap(Phase::Verify.as_str(), &pending, attempt, fix_cap)?;

        let mut next_number = task_store::list(base, plan_id)?
            .iter()
            .map(|t| t.number)
            .max()
            .unwrap_or(0)
            + 1;
        for finding in &pending {
            let task = Task {
                number: next_number,
                title: format!("Fix: {}", finding.title),
                status: TaskStatus::Pending,
                phase: Phase::Verify.as_str().to_string(),
                task_type: TaskType::Fix,
                origin: TaskOrigin::Fix,
                deliverable: 0,
                domain: String::new(),
                profile: crate::types::Profile::IMPLEMENTATION.to_string(),
                skills: Vec::new(),
                depends_on: Vec::new(),
                description: finding.detail.clone(),
                steps: finding
                    .file_path
                    .as_ref()
                    .map(|f| {
                        vec![crate::store::schema::Step {
                            file_path: f.clone(),
                            description: finding.detail.clone(),
                            status: crate::types::StepStatus::Pending,
                        }]
                    })
                    .unwrap_or_default(),
                verification: crate::store::schema::TaskVerification::default(),
                current_step: 0,
            };
            task_store::create(base, plan_id, &task)?;
            next_number += 1;
        }
        logging::work(
            base,
            Some(plan_id),
            LogLevel::Warn,
            WorkLogCategory::Artifact,
            "verify",
            &format!("re-entry {attempt}: created {} FIX task(s)", pending.len()),
        )?;
    }
}

/// Run the Finalize phase body. Git and PR integration are out of scope;
/// this only records that the plan reached its terminal phase.
pub fn run_finalize_phase(base: &Path, plan_id: &str) -> Result<Plan> {
    enter(base, plan_id, Phase::Finalize)?;
    logging::decision(
        base,
        Some(plan_id),
        LogLevel::Info,
        "finalize",
        "plan reached its terminal phase",
    )?;
    store::plan::transition(base, plan_id, Phase::Finalize, PhaseStatus::Done)
}

/// Render `result`'s parsed errors for a human, using the command key's
/// configured acceptable-warnings allow-list.
pub fn render_task_output(base: &Path, command_key: &str, result: &command_exec::RunResult) -> Result<String> {
    let state = timeout_store::inspect(base, command_key)?;
    let acceptable = state.map(|s| s.acceptable_warnings).unwrap_or_default();
    Ok(command_exec::render(&result.parsed_errors, &acceptable, OutputMode::Actionable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn enter_transitions_pending_to_in_progress() {
        let dir = tempdir().unwrap();
        store::plan::create(dir.path(), "add-x").unwrap();
        let plan = enter(dir.path(), "add-x", Phase::Init).unwrap();
        assert_eq!(plan.status_of(Phase::Init), PhaseStatus::InProgress);
    }

    #[test]
    fn try_close_on_gateless_phase_transitions_straight_to_done() {
        let dir = tempdir().unwrap();
        store::plan::create(dir.path(), "add-x").unwrap();
        enter(dir.path(), "add-x", Phase::Init).unwrap();
        let outcome = try_close(dir.path(), "add-x", Phase::Init).unwrap();
        assert!(matches!(outcome, PhaseOutcome::Done(_)));
    }

    #[test]
    fn outline_requires_approval_after_gate_clears() {
        let dir = tempdir().unwrap();
        store::plan::create(dir.path(), "add-x").unwrap();
        store::request::create(dir.path(), "add-x", "Add X").unwrap();
        store::references::create(dir.path(), "add-x", vec!["backend".to_string()]).unwrap();
        store::outline::write(
            dir.path(),
            "add-x",
            &crate::store::schema::SolutionOutline::default(),
        )
        .unwrap();
        enter(dir.path(), "add-x", Phase::Init).unwrap();
        try_close(dir.path(), "add-x", Phase::Init).unwrap();
        enter(dir.path(), "add-x", Phase::Refine).unwrap();
        try_close(dir.path(), "add-x", Phase::Refine).unwrap();
        enter(dir.path(), "add-x", Phase::Outline).unwrap();

        let outcome = try_close(dir.path(), "add-x", Phase::Outline).unwrap();
        assert!(matches!(outcome, PhaseOutcome::AwaitingUserApproval));

        let plan = approve_outline(dir.path(), "add-x", 1).unwrap();
        assert_eq!(plan.status_of(Phase::Outline), PhaseStatus::Done);
    }
}
