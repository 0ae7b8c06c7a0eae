//! On-disk layout under `<base>/plans/<plan_id>/` and `<base>/` globals.

use std::path::{Path, PathBuf};

/// Root of all plan directories for a given base directory.
pub fn plans_root(base: &Path) -> PathBuf {
    base.join("plans")
}

/// Directory for a single plan.
pub fn plan_dir(base: &Path, plan_id: &str) -> PathBuf {
    plans_root(base).join(plan_id)
}

pub fn config_toon(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("config.toon")
}

pub fn status_toon(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("status.toon")
}

pub fn request_md(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("request.md")
}

pub fn references_toon(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("references.toon")
}

pub fn solution_outline_md(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("solution_outline.md")
}

pub fn tasks_dir(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("tasks")
}

pub fn task_json(base: &Path, plan_id: &str, number: u32) -> PathBuf {
    tasks_dir(base, plan_id).join(format!("TASK-{number:03}.json"))
}

pub fn assessments_jsonl(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("artifacts").join("assessments.jsonl")
}

pub fn qgate_phase_jsonl(base: &Path, plan_id: &str, phase: &str) -> PathBuf {
    plan_dir(base, plan_id).join("qgate").join(format!("{phase}.jsonl"))
}

pub fn work_log(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("logs").join("work.log")
}

pub fn decision_log(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("logs").join("decision.log")
}

pub fn script_execution_log(base: &Path, plan_id: &str) -> PathBuf {
    plan_dir(base, plan_id).join("script-execution.log")
}

pub fn global_marshal_json(base: &Path) -> PathBuf {
    base.join("marshal.json")
}

pub fn global_run_configuration_json(base: &Path) -> PathBuf {
    base.join("run-configuration.json")
}

pub fn global_daily_log(base: &Path, date: &str) -> PathBuf {
    base.join("logs").join(format!("{date}.log"))
}

pub fn temp_dir(base: &Path) -> PathBuf {
    base.join("temp")
}

/// Plan IDs must match `^[a-z][a-z0-9-]+$`.
pub fn is_valid_plan_id(plan_id: &str) -> bool {
    let mut chars = plan_id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    let rest: Vec<char> = chars.collect();
    !rest.is_empty() && rest.iter().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_plan_ids_accept_lowercase_kebab_case() {
        assert!(is_valid_plan_id("add-login-page"));
        assert!(is_valid_plan_id("fix-42"));
    }

    #[test]
    fn invalid_plan_ids_are_rejected() {
        assert!(!is_valid_plan_id(""));
        assert!(!is_valid_plan_id("a"));
        assert!(!is_valid_plan_id("Add-Login"));
        assert!(!is_valid_plan_id("-leading-dash"));
        assert!(!is_valid_plan_id("has_underscore"));
    }
}
