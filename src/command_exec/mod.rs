//! The Command Executor: wraps external shell commands with a
//! two-layer timeout, captured output, exit-code classification, and
//! pluggable parsed-error extraction.

pub mod parsers;

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::timing::Timer;

pub use parsers::{ParsedError, parse_output};

/// Extra wall-clock slack given to the outer SIGKILL deadline beyond the
/// inner command timeout.
pub const OUTER_SLACK_SECONDS: u64 = 30;

/// Outcome status of one command run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
    Timeout,
}

/// Requested verbosity of the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Errors plus warnings not covered by the acceptable-warnings allow-list.
    Actionable,
    /// All errors and warnings, with accepted ones annotated.
    Structured,
    /// Only errors, compact.
    Errors,
}

/// The structured result of [`run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub exit_code: i32,
    pub duration_seconds: u64,
    pub log_file_path: PathBuf,
    pub parsed_errors: Vec<ParsedError>,
}

/// Run `command args...` with the given environment and working directory,
/// bounded by a two-layer timeout: `inner_timeout_seconds` is the
/// budget handed to the command's own logic; the outer deadline is always
/// `inner + OUTER_SLACK_SECONDS` so the wrapper never races the command's own
/// graceful-timeout handling.
///
/// Never returns `Err` for a failing or timed-out command — a structured
/// `RunResult` always comes back.
pub fn run(
    command: &str,
    args: &[String],
    env: &HashMap<String, String>,
    working_dir: &Path,
    inner_timeout_seconds: u64,
    log_file_path: &Path,
    build_system: &str,
) -> Result<RunResult> {
    let _timer = Timer::new("command_exec_run");
    let outer_timeout = Duration::from_secs(inner_timeout_seconds + OUTER_SLACK_SECONDS);

    let mut child = Command::new(command)
        .args(args)
        .envs(env)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| crate::error::Error::Io {
            path: working_dir.to_path_buf(),
            source: e,
        })?;

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let (tx, rx) = mpsc::channel();
    let collector_command = command.to_string();
    std::thread::spawn(move || {
        use std::io::Read;
        let mut out = String::new();
        let mut err = String::new();
        let mut stdout = stdout;
        let mut stderr = stderr;
        let _ = stdout.read_to_string(&mut out);
        let _ = stderr.read_to_string(&mut err);
        let _ = tx.send((out, err, collector_command));
    });

    let started = std::time::Instant::now();
    let wait_result = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) if started.elapsed() >= outer_timeout => break None,
            Ok(None) => std::thread::sleep(Duration::from_millis(50)),
            Err(_) => break None,
        }
    };

    let duration_seconds = started.elapsed().as_secs();
    let (stdout_text, stderr_text) = rx
        .recv_timeout(Duration::from_millis(500))
        .map(|(out, err, _)| (out, err))
        .unwrap_or_default();

    let combined = format!("{stdout_text}\n{stderr_text}");
    write_log_file(log_file_path, &combined)?;

    let (status, exit_code) = match wait_result {
        Some(status) => {
            if status.success() {
                (RunStatus::Success, 0)
            } else {
                (RunStatus::Error, status.code().unwrap_or(-1))
            }
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            (RunStatus::Timeout, 124)
        }
    };

    let parsed_errors = parse_output(build_system, &combined);

    Ok(RunResult {
        status,
        exit_code,
        duration_seconds,
        log_file_path: log_file_path.to_path_buf(),
        parsed_errors,
    })
}

fn write_log_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| crate::error::Error::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let mut file = std::fs::File::create(path).map_err(|e| crate::error::Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    file.write_all(content.as_bytes())
        .map_err(|e| crate::error::Error::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Render `parsed_errors` under the requested output mode, given the set of
/// warning categories accepted for this command key.
pub fn render(parsed_errors: &[ParsedError], acceptable_warnings: &[String], mode: OutputMode) -> String {
    let mut lines = Vec::new();
    for error in parsed_errors {
        let is_accepted = error.category == "warning" && acceptable_warnings.iter().any(|w| w == &error.message);
        match mode {
            OutputMode::Errors if error.category != "error" => continue,
            OutputMode::Actionable if is_accepted => continue,
            _ => {}
        }
        let marker = if mode == OutputMode::Structured && is_accepted {
            " [accepted]"
        } else {
            ""
        };
        lines.push(format!(
            "{}:{}: [{}] {}{marker}",
            error.file, error.line, error.category, error.message
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn successful_command_reports_success_and_exit_zero() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("script-execution.log");
        let result = run(
            "true",
            &[],
            &HashMap::new(),
            dir.path(),
            5,
            &log_path,
            "generic",
        )
        .unwrap();
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn failing_command_reports_error_with_nonzero_exit() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("script-execution.log");
        let result = run(
            "false",
            &[],
            &HashMap::new(),
            dir.path(),
            5,
            &log_path,
            "generic",
        )
        .unwrap();
        assert_eq!(result.status, RunStatus::Error);
        assert_ne!(result.exit_code, 0);
    }

    #[test]
    fn outer_deadline_exceeds_inner_timeout_by_exactly_the_slack() {
        assert_eq!(OUTER_SLACK_SECONDS, 30);
        let inner = 60;
        let outer = Duration::from_secs(inner + OUTER_SLACK_SECONDS);
        assert!(outer > Duration::from_secs(inner));
    }

    #[test]
    fn render_actionable_mode_drops_accepted_warnings() {
        let errors = vec![
            ParsedError {
                file: "a.rs".to_string(),
                line: 1,
                message: "unused variable".to_string(),
                category: "warning".to_string(),
            },
            ParsedError {
                file: "b.rs".to_string(),
                line: 2,
                message: "missing semicolon".to_string(),
                category: "error".to_string(),
            },
        ];
        let acceptable = vec!["unused variable".to_string()];
        let rendered = render(&errors, &acceptable, OutputMode::Actionable);
        assert!(!rendered.contains("unused variable"));
        assert!(rendered.contains("missing semicolon"));
    }
}
