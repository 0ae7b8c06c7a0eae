//! The Logging Pipeline: append-only structured logs, scoped per-plan
//! or global, with retention cleanup.
//!
//! This is the durable, plan-scoped audit trail. It is complementary to
//! `tracing`: `tracing` is the process-local/operational view;
//! these `.log` files are what a later `marshal` invocation, or a human,
//! reads back.

use std::path::Path;

use chrono::Utc;

use crate::error::Result;
use crate::io;
use crate::store::paths;
use crate::types::{LogLevel, LogStream, WorkLogCategory};

/// Retention for global (non-plan-scoped) logs, in days.
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

fn destination(base: &Path, plan_id: Option<&str>, stream: LogStream) -> std::path::PathBuf {
    match (plan_id, stream) {
        (Some(id), _) if paths::plan_dir(base, id).is_dir() => match stream {
            LogStream::Script => paths::script_execution_log(base, id),
            LogStream::Work => paths::work_log(base, id),
            LogStream::Decision => paths::decision_log(base, id),
        },
        _ => paths::global_daily_log(base, &Utc::now().format("%Y-%m-%d").to_string()),
    }
}

fn write_entry(
    base: &Path,
    plan_id: Option<&str>,
    stream: LogStream,
    level: LogLevel,
    category: &str,
    caller: &str,
    message: &str,
) -> Result<()> {
    let entry = crate::store::LogEntry {
        timestamp: Utc::now(),
        level,
        category: category.to_string(),
        caller: caller.to_string(),
        message: message.to_string(),
    };
    io::append_line(&destination(base, plan_id, stream), &entry.render())?;

    match level {
        LogLevel::Info => tracing::info!(plan_id, category, caller, "{message}"),
        LogLevel::Warn => tracing::warn!(plan_id, category, caller, "{message}"),
        LogLevel::Error => tracing::error!(plan_id, category, caller, "{message}"),
    }
    Ok(())
}

/// Append to the per-plan (or daily-global) script-execution log.
pub fn script(base: &Path, plan_id: Option<&str>, level: LogLevel, caller: &str, message: &str) -> Result<()> {
    write_entry(base, plan_id, LogStream::Script, level, "SCRIPT", caller, message)
}

/// Append to the work log, with one of the three work-log categories.
pub fn work(
    base: &Path,
    plan_id: Option<&str>,
    level: LogLevel,
    category: WorkLogCategory,
    caller: &str,
    message: &str,
) -> Result<()> {
    let category_str = match category {
        WorkLogCategory::Status => "STATUS",
        WorkLogCategory::Artifact => "ARTIFACT",
        WorkLogCategory::Decision => "DECISION",
    };
    write_entry(base, plan_id, LogStream::Work, level, category_str, caller, message)
}

/// Append to the decision log (phase-level reasoning and gate outcomes).
pub fn decision(base: &Path, plan_id: Option<&str>, level: LogLevel, caller: &str, message: &str) -> Result<()> {
    write_entry(base, plan_id, LogStream::Decision, level, "DECISION", caller, message)
}

/// Delete daily global log files older than `retention_days`. Per-plan logs
/// are never touched by retention — they live with the plan.
pub fn cleanup(base: &Path, retention_days: u64) -> Result<Vec<std::path::PathBuf>> {
    let logs_dir = base.join("logs");
    if !logs_dir.is_dir() {
        return Ok(Vec::new());
    }
    let cutoff = Utc::now().date_naive() - chrono::Duration::days(retention_days as i64);

    let mut removed = Vec::new();
    for entry in walkdir::WalkDir::new(&logs_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| crate::error::Error::Other(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Ok(date) = chrono::NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
            continue;
        };
        if date < cutoff {
            std::fs::remove_file(entry.path()).map_err(|e| crate::error::Error::Io {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            removed.push(entry.path().to_path_buf());
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_to_daily_global_log_when_plan_directory_absent() {
        let dir = tempdir().unwrap();
        work(
            dir.path(),
            Some("missing-plan"),
            LogLevel::Info,
            WorkLogCategory::Status,
            "init",
            "plan created",
        )
        .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let text = io::read_to_string(&paths::global_daily_log(dir.path(), &today)).unwrap();
        assert!(text.contains("[STATUS]"));
        assert!(text.contains("plan created"));
    }

    #[test]
    fn writes_to_per_plan_log_when_plan_directory_exists() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(paths::plan_dir(dir.path(), "add-x")).unwrap();
        decision(dir.path(), Some("add-x"), LogLevel::Info, "outline", "q-gate drained").unwrap();

        let text = io::read_to_string(&paths::decision_log(dir.path(), "add-x")).unwrap();
        assert!(text.contains("q-gate drained"));
    }

    #[test]
    fn cleanup_removes_logs_older_than_retention() {
        let dir = tempdir().unwrap();
        let logs_dir = dir.path().join("logs");
        std::fs::create_dir_all(&logs_dir).unwrap();
        std::fs::write(logs_dir.join("2000-01-01.log"), "old").unwrap();
        let today = Utc::now().format("%Y-%m-%d").to_string();
        std::fs::write(logs_dir.join(format!("{today}.log")), "new").unwrap();

        let removed = cleanup(dir.path(), DEFAULT_RETENTION_DAYS).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!logs_dir.join("2000-01-01.log").exists());
        assert!(logs_dir.join(format!("{today}.log")).exists());
    }
}
