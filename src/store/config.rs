//! Typed operations over per-plan `PlanConfiguration` / `config.toon` and the
//! global `RunConfiguration` / `run-configuration.json`.

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::io;

use super::paths;
use super::schema::{PlanConfiguration, RunConfiguration};

const PLAN_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
/// Run-configuration updates use a 5-second lock timeout; on timeout the
/// update is dropped with a WARN rather than propagated.
const RUN_CONFIG_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create_plan_config(base: &Path, plan_id: &str, config: &PlanConfiguration) -> Result<()> {
    let path = paths::config_toon(base, plan_id);
    let _lock = io::acquire_exclusive(&path, PLAN_LOCK_TIMEOUT)?;
    io::write_atomic(&path, &config.to_toon())
}

pub fn read_plan_config(base: &Path, plan_id: &str) -> Result<PlanConfiguration> {
    let path = paths::config_toon(base, plan_id);
    let _lock = io::acquire_shared(&path, PLAN_LOCK_TIMEOUT)?;
    PlanConfiguration::from_toon(&io::read_to_string(&path)?)
}

pub fn update_plan_config(
    base: &Path,
    plan_id: &str,
    f: impl FnOnce(&mut PlanConfiguration),
) -> Result<PlanConfiguration> {
    let path = paths::config_toon(base, plan_id);
    let _lock = io::acquire_exclusive(&path, PLAN_LOCK_TIMEOUT)?;
    let mut config = PlanConfiguration::from_toon(&io::read_to_string(&path)?)?;
    f(&mut config);
    io::write_atomic(&path, &config.to_toon())?;
    Ok(config)
}

pub fn read_run_configuration(base: &Path) -> Result<RunConfiguration> {
    let path = paths::global_run_configuration_json(base);
    if !path.is_file() {
        return Ok(RunConfiguration::default());
    }
    let _lock = io::acquire_shared(&path, RUN_CONFIG_LOCK_TIMEOUT)?;
    let text = io::read_to_string(&path)?;
    serde_json::from_str(&text).map_err(|e| Error::Serialization {
        what: "run-configuration.json".to_string(),
        source: e,
    })
}

/// Read-modify-write the global run-configuration file. A lock timeout
/// here is not escalated to the caller: the update is dropped and a
/// WARN is logged, since the system converges on a subsequent update.
pub fn update_run_configuration(
    base: &Path,
    f: impl FnOnce(&mut RunConfiguration),
) -> Result<Option<RunConfiguration>> {
    let path = paths::global_run_configuration_json(base);
    let lock = io::acquire_exclusive(&path, RUN_CONFIG_LOCK_TIMEOUT);
    let _lock = match lock {
        Ok(lock) => lock,
        Err(Error::LockTimeout { document, waited_ms }) => {
            tracing::warn!(document, waited_ms, "dropping run-configuration update after lock timeout");
            return Ok(None);
        }
        Err(other) => return Err(other),
    };

    let mut config = if path.is_file() {
        serde_json::from_str(&io::read_to_string(&path)?).map_err(|e| Error::Serialization {
            what: "run-configuration.json".to_string(),
            source: e,
        })?
    } else {
        RunConfiguration::default()
    };
    f(&mut config);
    let json = serde_json::to_string_pretty(&config).map_err(|e| Error::Serialization {
        what: "run-configuration.json".to_string(),
        source: e,
    })?;
    io::write_atomic(&path, &json)?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn plan_config_round_trips_and_updates() {
        let dir = tempdir().unwrap();
        create_plan_config(dir.path(), "add-x", &PlanConfiguration::default()).unwrap();
        update_plan_config(dir.path(), "add-x", |c| c.create_pr = true).unwrap();
        let config = read_plan_config(dir.path(), "add-x").unwrap();
        assert!(config.create_pr);
    }

    #[test]
    fn run_configuration_defaults_when_absent() {
        let dir = tempdir().unwrap();
        let config = read_run_configuration(dir.path()).unwrap();
        assert!(config.command_keys.is_empty());
    }

    #[test]
    fn run_configuration_update_persists() {
        let dir = tempdir().unwrap();
        update_run_configuration(dir.path(), |c| {
            c.ci.git_present = true;
        })
        .unwrap();
        let config = read_run_configuration(dir.path()).unwrap();
        assert!(config.ci.git_present);
    }
}
