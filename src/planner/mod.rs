//! The Task Planner: expands a [`SolutionOutline`]'s deliverables into
//! a task DAG and groups it into parallel execution layers.
//!
//! Expansion is 1:N per deliverable — one task per (profile, skill-bundle)
//! — never N:1: two deliverables are never folded into a single task, even
//! when they touch the same file, so that `depends_on` always names task
//! numbers within a single deliverable's own chain or the tail of a
//! deliverable it declared a dependency on.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::capability::CapabilityResolver;
use crate::error::{Error, Result};
use crate::store::schema::{Deliverable, SolutionOutline, Step, Task, TaskVerification};
use crate::store::{outline, task as task_store};
use crate::types::{Profile, StepStatus, TaskOrigin, TaskStatus, TaskType};

/// One parallel execution group: every task in `task_numbers` may run
/// concurrently because none of them depends on another in the same group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionGroup {
    pub layer: usize,
    pub task_numbers: Vec<u32>,
}

/// Read the plan's outline, expand every deliverable into tasks, and
/// persist them via [`task_store::create`]. Returns the tasks created, in
/// task-number order. Idempotent by number: re-planning an already-planned
/// deliverable is the caller's responsibility to avoid (the store itself
/// rejects a duplicate `create`).
pub fn expand_plan(base: &Path, plan_id: &str, capability: &CapabilityResolver) -> Result<Vec<Task>> {
    let solution_outline = outline::read(base, plan_id)?;
    check_acyclic(&solution_outline)?;

    let mut next_number = task_store::list(base, plan_id)?
        .iter()
        .map(|t| t.number)
        .max()
        .unwrap_or(0)
        + 1;

    // The last task number in each deliverable's own chain, used to wire
    // inter-deliverable `depends_on` edges.
    let mut tail_of: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    let mut created = Vec::new();

    let mut deliverables: Vec<&Deliverable> = solution_outline.deliverables.iter().collect();
    deliverables.sort_by_key(|d| d.number);

    for deliverable in deliverables {
        let mut profiles = deliverable.profiles.clone();
        profiles.sort_by_key(|p| Profile::parse(p.as_str()).ordering_key());
        profiles.dedup();

        let upstream: Vec<u32> = deliverable
            .depends
            .iter()
            .flat_map(|dep_number| tail_of.get(dep_number).cloned().unwrap_or_default())
            .collect();

        let mut chain: Vec<u32> = Vec::new();
        let mut deliverable_tasks = Vec::new();

        for profile in &profiles {
            let skills = capability.skills_by_profile(&deliverable.module, profile)?;
            if skills.is_empty() {
                // profile mapped to `skip` — no task for this profile.
                continue;
            }

            let depends_on: Vec<String> = if let Some(&prev) = chain.last() {
                vec![prev.to_string()]
            } else {
                upstream.iter().map(|n| n.to_string()).collect()
            };

            let number = next_number;
            next_number += 1;

            let tasks_for_profile = build_tasks_for_profile(
                number,
                deliverable,
                profile,
                &skills,
                depends_on,
                &mut next_number,
            );

            for t in tasks_for_profile {
                chain.push(t.number);
                deliverable_tasks.push(t);
            }
        }

        for t in &deliverable_tasks {
            task_store::create(base, plan_id, t)?;
        }
        tail_of.insert(deliverable.number, chain);
        created.extend(deliverable_tasks);
    }

    Ok(created)
}

/// Build the task(s) for a single (deliverable, profile) pair. A `mixed`
/// execution-mode deliverable splits into an automated task plus a manual
/// review task, since the core tracks manual work as an
/// ordinary task rather than an out-of-band gate.
fn build_tasks_for_profile(
    first_number: u32,
    deliverable: &Deliverable,
    profile: &str,
    skills: &[String],
    depends_on: Vec<String>,
    next_number: &mut u32,
) -> Vec<Task> {
    let steps: Vec<Step> = deliverable
        .affected_files
        .iter()
        .map(|f| Step {
            file_path: f.clone(),
            description: deliverable.change_per_file.clone(),
            status: StepStatus::Pending,
        })
        .collect();

    let automated_task = Task {
        number: first_number,
        title: format!("{} ({profile})", deliverable.title),
        status: TaskStatus::Pending,
        phase: crate::types::Phase::Plan.as_str().to_string(),
        task_type: TaskType::Impl,
        origin: TaskOrigin::Plan,
        deliverable: deliverable.number,
        domain: deliverable.domain.clone(),
        profile: profile.to_string(),
        skills: skills.to_vec(),
        depends_on,
        description: deliverable.change_per_file.clone(),
        steps: steps.clone(),
        verification: TaskVerification {
            commands: vec![deliverable.verification.command.clone()],
            criteria: deliverable.verification.criteria.clone(),
            manual: false,
        },
        current_step: 0,
    };

    if deliverable.execution_mode != crate::types::ExecutionMode::Mixed {
        return vec![automated_task];
    }

    let manual_number = *next_number;
    *next_number += 1;
    let manual_task = Task {
        number: manual_number,
        title: format!("{} ({profile}, manual review)", deliverable.title),
        status: TaskStatus::Pending,
        phase: crate::types::Phase::Plan.as_str().to_string(),
        task_type: TaskType::Impl,
        origin: TaskOrigin::Plan,
        deliverable: deliverable.number,
        domain: deliverable.domain.clone(),
        profile: profile.to_string(),
        skills: Vec::new(),
        depends_on: vec![automated_task.number.to_string()],
        description: format!("manual verification: {}", deliverable.verification.criteria),
        steps,
        verification: TaskVerification {
            commands: Vec::new(),
            criteria: deliverable.verification.criteria.clone(),
            manual: true,
        },
        current_step: 0,
    };

    vec![automated_task, manual_task]
}

/// Reject an outline whose `depends` edges form a cycle, before any task is
/// created from it.
fn check_acyclic(outline: &SolutionOutline) -> Result<()> {
    let edges: BTreeMap<u32, &[u32]> = outline
        .deliverables
        .iter()
        .map(|d| (d.number, d.depends.as_slice()))
        .collect();

    let mut visited: HashSet<u32> = HashSet::new();
    let mut stack: HashSet<u32> = HashSet::new();

    fn visit(
        node: u32,
        edges: &BTreeMap<u32, &[u32]>,
        visited: &mut HashSet<u32>,
        stack: &mut HashSet<u32>,
    ) -> Result<()> {
        if stack.contains(&node) {
            return Err(Error::InvariantViolation(format!(
                "deliverable dependency cycle through deliverable {node}"
            )));
        }
        if visited.contains(&node) {
            return Ok(());
        }
        stack.insert(node);
        if let Some(deps) = edges.get(&node) {
            for &dep in *deps {
                visit(dep, edges, visited, stack)?;
            }
        }
        stack.remove(&node);
        visited.insert(node);
        Ok(())
    }

    for &number in edges.keys() {
        visit(number, &edges, &mut visited, &mut stack)?;
    }
    Ok(())
}

/// Group `tasks` into parallel execution layers by longest-path depth in
/// the `depends_on` graph: layer 0 has no dependencies, layer N
/// depends only on layers < N. Ties within a layer are broken by
/// deliverable number ascending, then IMPL-before-TEST profile ordering.
pub fn topological_layers(tasks: &[Task]) -> Result<Vec<ExecutionGroup>> {
    let by_number: BTreeMap<u32, &Task> = tasks.iter().map(|t| (t.number, t)).collect();
    let mut depth: BTreeMap<u32, usize> = BTreeMap::new();

    fn compute_depth(
        number: u32,
        by_number: &BTreeMap<u32, &Task>,
        depth: &mut BTreeMap<u32, usize>,
        visiting: &mut HashSet<u32>,
    ) -> Result<usize> {
        if let Some(&d) = depth.get(&number) {
            return Ok(d);
        }
        if visiting.contains(&number) {
            return Err(Error::InvariantViolation(format!(
                "task dependency cycle through TASK-{number:03}"
            )));
        }
        visiting.insert(number);
        let task = by_number
            .get(&number)
            .ok_or_else(|| Error::NotFound(format!("TASK-{number:03}")))?;
        let mut max_dep_depth = 0usize;
        for dep in &task.depends_on {
            let dep_number: u32 = dep
                .parse()
                .map_err(|_| Error::InvariantViolation(format!("bad depends_on entry `{dep}`")))?;
            let dep_depth = compute_depth(dep_number, by_number, depth, visiting)?;
            max_dep_depth = max_dep_depth.max(dep_depth + 1);
        }
        visiting.remove(&number);
        depth.insert(number, max_dep_depth);
        Ok(max_dep_depth)
    }

    let mut visiting = HashSet::new();
    for &number in by_number.keys() {
        compute_depth(number, &by_number, &mut depth, &mut visiting)?;
    }

    let max_layer = depth.values().copied().max().unwrap_or(0);
    let mut layers: Vec<Vec<u32>> = vec![Vec::new(); max_layer + 1];
    for (&number, &d) in &depth {
        layers[d].push(number);
    }

    for layer in &mut layers {
        layer.sort_by_key(|number| {
            let task = by_number[number];
            (
                task.deliverable,
                Profile::parse(task.profile.as_str()).ordering_key(),
                task.number,
            )
        });
    }

    Ok(layers
        .into_iter()
        .enumerate()
        .map(|(layer, task_numbers)| ExecutionGroup { layer, task_numbers })
        .collect())
}
