//! The Adaptive Timeout Store: per-command-key timeout memory,
//! weighted toward the higher observed value.

use std::path::Path;

use crate::error::Result;
use crate::store::config;
use crate::store::schema::{CommandKeyState, LastExecution};

/// Persisted values are scaled up by this margin before being returned as
/// the next timeout, so a learned ceiling still has headroom.
pub const SAFETY_MARGIN: f64 = 1.25;
/// `set()` weights the higher of (old, new) at 80% and the lower at 20%.
pub const HIGHER_WEIGHT: f64 = 0.80;
/// No timeout is ever returned below this floor, regardless of history.
pub const MIN_FLOOR: u64 = 120;

/// `get(command_key, default_seconds)`: `max(MIN_FLOOR, persisted *
/// SAFETY_MARGIN)` when a value is persisted, else `max(MIN_FLOOR, default)`.
pub fn get(base: &Path, command_key: &str, default_seconds: u64) -> Result<u64> {
    let run_config = config::read_run_configuration(base)?;
    let persisted = run_config
        .command_keys
        .get(command_key)
        .and_then(|s| s.timeout_seconds);

    let candidate = match persisted {
        Some(value) => (value as f64 * SAFETY_MARGIN).round() as u64,
        None => default_seconds,
    };
    Ok(candidate.max(MIN_FLOOR))
}

/// `set(command_key, observed_duration)`: if no existing value, store
/// `observed`; else weight the higher of (old, observed) at `HIGHER_WEIGHT`.
/// Returns the newly stored value.
pub fn set(base: &Path, command_key: &str, observed_duration_seconds: u64, status: &str) -> Result<u64> {
    let mut stored = observed_duration_seconds;
    config::update_run_configuration(base, |run_config| {
        let entry = run_config
            .command_keys
            .entry(command_key.to_string())
            .or_default();

        let new_value = match entry.timeout_seconds {
            None => observed_duration_seconds,
            Some(old) => weighted_update(old, observed_duration_seconds),
        };

        entry.timeout_seconds = Some(new_value);
        entry.last_execution = Some(LastExecution {
            date: chrono::Utc::now(),
            duration_seconds: observed_duration_seconds,
            status: status.to_string(),
        });
        stored = new_value;
    })?;
    Ok(stored)
}

fn weighted_update(old: u64, observed: u64) -> u64 {
    let higher = old.max(observed) as f64;
    let lower = old.min(observed) as f64;
    (HIGHER_WEIGHT * higher + (1.0 - HIGHER_WEIGHT) * lower).round() as u64
}

/// Read the raw persisted state for a command key, if any, without applying
/// the safety margin — useful for diagnostics/inspection commands.
pub fn inspect(base: &Path, command_key: &str) -> Result<Option<CommandKeyState>> {
    let run_config = config::read_run_configuration(base)?;
    Ok(run_config.command_keys.get(command_key).cloned())
}
