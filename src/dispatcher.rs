//! The Dispatcher/Router: resolves a notation-addressed skill invocation to
//! the script that implements it and runs it through the Command Executor.
//!
//! Scripts are routed through a statically registered dispatch table rather
//! than discovered by walking a directory tree at runtime: every notation
//! this core can route is named once, here. A project wiring up a new skill
//! adds a row to [`DISPATCH_TABLE`]; the dispatcher never globs for
//! executables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::command_exec::{self, RunResult};
use crate::error::{Error, Result};
use crate::logging;
use crate::store::paths;
use crate::types::LogLevel;

/// One statically registered `<bundle>:<skill>:<script>` notation and the
/// script file (relative to the project's scripts root) that implements it.
#[derive(Debug, Clone, Copy)]
pub struct DispatchEntry {
    pub notation: &'static str,
    pub script_path: &'static str,
}

/// The core's built-in notations. Projects extend capability coverage
/// through `marshal.json`'s `skills_by_profile`/`recipes`, not by adding
/// rows here — this table only ever grows with the core itself.
pub const DISPATCH_TABLE: &[DispatchEntry] = &[
    DispatchEntry {
        notation: "generic:change:implement",
        script_path: "generic/change/implement.sh",
    },
    DispatchEntry {
        notation: "generic:change:fix",
        script_path: "generic/change/fix.sh",
    },
];

/// Parsed `<bundle>:<skill>:<script>` notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notation {
    pub bundle: String,
    pub skill: String,
    pub script: String,
}

impl Notation {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, ':');
        let (Some(bundle), Some(skill), Some(script)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::InvalidInput {
                field: "notation".to_string(),
                reason: format!("`{raw}` is not `<bundle>:<skill>:<script>`"),
            });
        };
        Ok(Self {
            bundle: bundle.to_string(),
            skill: skill.to_string(),
            script: script.to_string(),
        })
    }

    pub fn as_str(&self) -> String {
        format!("{}:{}:{}", self.bundle, self.skill, self.script)
    }
}

/// Look up the script path registered for `notation` in [`DISPATCH_TABLE`].
pub fn resolve(notation: &str) -> Result<&'static str> {
    DISPATCH_TABLE
        .iter()
        .find(|entry| entry.notation == notation)
        .map(|entry| entry.script_path)
        .ok_or_else(|| Error::NotFound(format!("no dispatch entry registered for `{notation}`")))
}

/// Run `<notation> <command> [args...]`: resolve the notation to its
/// registered script, log the dispatch to the script-execution log, and
/// execute it through the Command Executor.
#[allow(clippy::too_many_arguments)]
pub fn dispatch(
    base: &Path,
    plan_id: &str,
    scripts_root: &Path,
    notation: &str,
    command: &str,
    args: &[String],
    working_dir: &Path,
    timeout_seconds: u64,
) -> Result<RunResult> {
    let relative = resolve(notation)?;
    let script_path: PathBuf = scripts_root.join(relative);

    logging::script(
        base,
        Some(plan_id),
        LogLevel::Info,
        notation,
        &format!("dispatching `{command}` with {} arg(s)", args.len()),
    )?;

    let mut full_args = vec![command.to_string()];
    full_args.extend(args.iter().cloned());

    let log_path = paths::script_execution_log(base, plan_id);
    command_exec::run(
        script_path.to_str().ok_or_else(|| Error::InvalidInput {
            field: "scripts_root".to_string(),
            reason: "script path is not valid UTF-8".to_string(),
        })?,
        &full_args,
        &HashMap::new(),
        working_dir,
        timeout_seconds,
        &log_path,
        "generic",
    )
}
