//! Typed operations over `Task` / `tasks/TASK-<NNN>.json`.

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::io;
use crate::types::TaskStatus;

use super::paths;
use super::schema::Task;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn exists(base: &Path, plan_id: &str, number: u32) -> bool {
    paths::task_json(base, plan_id, number).is_file()
}

/// Create a task document. `number` must not already exist — this is `create`, not an upsert.
pub fn create(base: &Path, plan_id: &str, task: &Task) -> Result<()> {
    if exists(base, plan_id, task.number) {
        return Err(Error::AlreadyExists(format!("TASK-{:03}", task.number)));
    }
    write(base, plan_id, task)
}

fn write(base: &Path, plan_id: &str, task: &Task) -> Result<()> {
    let path = paths::task_json(base, plan_id, task.number);
    let _lock = io::acquire_exclusive(&path, LOCK_TIMEOUT)?;
    let json = serde_json::to_string_pretty(task).map_err(|e| Error::Serialization {
        what: format!("TASK-{:03}", task.number),
        source: e,
    })?;
    io::write_atomic(&path, &json)
}

pub fn read(base: &Path, plan_id: &str, number: u32) -> Result<Task> {
    let path = paths::task_json(base, plan_id, number);
    let _lock = io::acquire_shared(&path, LOCK_TIMEOUT)?;
    let text = io::read_to_string(&path)?;
    serde_json::from_str(&text).map_err(|e| Error::Serialization {
        what: format!("TASK-{number:03}"),
        source: e,
    })
}

/// Read-modify-write under the task document's exclusive lock.
pub fn update(base: &Path, plan_id: &str, number: u32, f: impl FnOnce(&mut Task)) -> Result<Task> {
    let path = paths::task_json(base, plan_id, number);
    let _lock = io::acquire_exclusive(&path, LOCK_TIMEOUT)?;
    let mut task: Task = serde_json::from_str(&io::read_to_string(&path)?).map_err(|e| {
        Error::Serialization {
            what: format!("TASK-{number:03}"),
            source: e,
        }
    })?;
    f(&mut task);
    let json = serde_json::to_string_pretty(&task).map_err(|e| Error::Serialization {
        what: format!("TASK-{number:03}"),
        source: e,
    })?;
    io::write_atomic(&path, &json)?;
    Ok(task)
}

/// `done` is only legal once every step is settled and verification has
/// passed at least once.
pub fn transition(
    base: &Path,
    plan_id: &str,
    number: u32,
    to: TaskStatus,
    verification_passed: bool,
) -> Result<Task> {
    let current = read(base, plan_id, number)?;
    if to == TaskStatus::Done && !(current.steps_settled() && verification_passed) {
        return Err(Error::InvariantViolation(format!(
            "TASK-{number:03} cannot be done: steps settled = {}, verification passed = {verification_passed}",
            current.steps_settled()
        )));
    }
    update(base, plan_id, number, |task| {
        task.status = to;
    })
}

pub fn list(base: &Path, plan_id: &str) -> Result<Vec<Task>> {
    let dir = paths::tasks_dir(base, plan_id);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut numbers: Vec<u32> = walkdir::WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            name.strip_prefix("TASK-")?
                .strip_suffix(".json")?
                .parse::<u32>()
                .ok()
        })
        .collect();
    numbers.sort_unstable();

    numbers
        .into_iter()
        .map(|n| read(base, plan_id, n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::{Step, TaskVerification};
    use crate::types::{StepStatus, TaskOrigin, TaskType};
    use tempfile::tempdir;

    fn sample_task(number: u32) -> Task {
        Task {
            number,
            title: format!("Task {number}"),
            status: TaskStatus::Pending,
            phase: "4-plan".to_string(),
            task_type: TaskType::Impl,
            origin: TaskOrigin::Plan,
            deliverable: 1,
            domain: "backend".to_string(),
            profile: "implementation".to_string(),
            skills: vec!["backend:impl:generic".to_string()],
            depends_on: vec![],
            description: "implement the endpoint".to_string(),
            steps: vec![Step {
                file_path: "src/api.rs".to_string(),
                description: "add handler".to_string(),
                status: StepStatus::Pending,
            }],
            verification: TaskVerification {
                commands: vec!["cargo test api".to_string()],
                criteria: "exit 0".to_string(),
                manual: false,
            },
            current_step: 1,
        }
    }

    #[test]
    fn create_then_read_round_trips() {
        let dir = tempdir().unwrap();
        create(dir.path(), "add-x", &sample_task(1)).unwrap();
        let task = read(dir.path(), "add-x", 1).unwrap();
        assert_eq!(task.title, "Task 1");
    }

    #[test]
    fn create_twice_is_rejected() {
        let dir = tempdir().unwrap();
        create(dir.path(), "add-x", &sample_task(1)).unwrap();
        let err = create(dir.path(), "add-x", &sample_task(1)).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn done_requires_settled_steps_and_passed_verification() {
        let dir = tempdir().unwrap();
        create(dir.path(), "add-x", &sample_task(1)).unwrap();

        let err = transition(dir.path(), "add-x", 1, TaskStatus::Done, true).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));

        update(dir.path(), "add-x", 1, |t| {
            t.steps[0].status = StepStatus::Done;
        })
        .unwrap();
        let task = transition(dir.path(), "add-x", 1, TaskStatus::Done, true).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[test]
    fn list_returns_tasks_sorted_by_number() {
        let dir = tempdir().unwrap();
        create(dir.path(), "add-x", &sample_task(2)).unwrap();
        create(dir.path(), "add-x", &sample_task(1)).unwrap();
        let tasks = list(dir.path(), "add-x").unwrap();
        assert_eq!(tasks.iter().map(|t| t.number).collect::<Vec<_>>(), vec![1, 2]);
    }
}
