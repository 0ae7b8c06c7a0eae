//! `marshal.json` schema: the shared, source-controlled project
//! configuration consumed by the [`super::CapabilityResolver`].
//!
//! Loading layers compiled-in defaults, the file itself, and
//! `PLAN_MARSHALL__`-prefixed environment variables through the `config`
//! crate before the merged document is validated against the embedded
//! JSON Schema and deserialized.

use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::paths;

/// Per-module capability commands and skill bundles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleCapabilities {
    /// `compile`, `verify`, `module-tests`, `quality-gate`, ... -> executable.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
    /// profile -> list of skill notations.
    #[serde(default)]
    pub skills_by_profile: BTreeMap<String, Vec<String>>,
}

/// A deterministic, trusted recipe that produces deliverables without
/// discovery or Q-Gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeConfig {
    pub recipe_skill: String,
    pub default_change_type: String,
    pub domain: String,
    pub profile: String,
    #[serde(default)]
    pub package_source: String,
}

/// Operational tunables layered in from `marshal.json`'s `app` section and
/// `PLAN_MARSHALL__APP__*` environment overrides. Defaults match the values
/// the rest of the core falls back to when no project configuration exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub retention_days: u64,
    pub execute_retry_cap: u32,
    pub verify_fix_cap: u32,
    pub q_gate_reentry_cap: u32,
    pub lock_timeout_seconds: u64,
    pub command_default_timeout_seconds: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            retention_days: crate::logging::DEFAULT_RETENTION_DAYS,
            execute_retry_cap: crate::phase::DEFAULT_EXECUTE_RETRY_CAP,
            verify_fix_cap: crate::phase::DEFAULT_VERIFY_FIX_CAP,
            q_gate_reentry_cap: crate::qgate::DEFAULT_REENTRY_CAP,
            lock_timeout_seconds: 5,
            command_default_timeout_seconds: 300,
        }
    }
}

/// The full shape of `marshal.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarshalConfig {
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleCapabilities>,
    #[serde(default)]
    pub recipes: BTreeMap<String, RecipeConfig>,
    /// `"<domain>:<change_type>"` -> agent notation.
    #[serde(default)]
    pub change_type_agents: BTreeMap<String, String>,
    #[serde(default)]
    pub app: AppSettings,
}

fn schema() -> Result<JSONSchema> {
    let schema_str = include_str!("marshal_config.schema.json");
    let schema_value: Value = serde_json::from_str(schema_str)
        .map_err(|e| Error::Other(format!("marshal_config schema is not valid JSON: {e}")))?;
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema_value)
        .map_err(|e| Error::Other(format!("failed to compile marshal_config schema: {e}")))
}

/// Validate a raw `marshal.json` value against the embedded schema before
/// deserializing it into [`MarshalConfig`], so a malformed shared config
/// produces one readable error instead of a confusing field-by-field one.
pub fn validate(value: &Value) -> Result<()> {
    let compiled = schema()?;
    let result = compiled.validate(value);
    if let Err(errors) = result {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(Error::SchemaViolation(messages.join("; ")));
    }
    Ok(())
}

/// Project-wide fallback location when `<base>/marshal.json` is absent:
/// `<XDG config dir>/plan-marshall/marshal.json`. Lets a machine share one
/// capability configuration across plan directories instead of requiring a
/// copy per project checkout.
fn xdg_fallback_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|dir| dir.join("plan-marshall").join("marshal.json"))
}

/// Load `<base>/marshal.json` (falling back to an XDG-aware project-wide
/// location when absent), layered over compiled-in defaults and
/// `PLAN_MARSHALL__`-prefixed environment overrides. A missing file at
/// either location is not an error — it is treated as an empty
/// configuration (no modules registered yet), with `app` still carrying
/// the compiled-in defaults.
pub fn load_marshal_config(base: &Path) -> Result<MarshalConfig> {
    let path = paths::global_marshal_json(base);
    let resolved = if path.is_file() {
        Some(path)
    } else {
        xdg_fallback_path().filter(|p| p.is_file())
    };

    let defaults = serde_json::to_string(&MarshalConfig::default()).map_err(|e| Error::Serialization {
        what: "marshal_config defaults".to_string(),
        source: e,
    })?;

    let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));
    if let Some(path) = resolved {
        builder = builder.add_source(File::from(path).format(FileFormat::Json));
    }
    builder = builder.add_source(Environment::with_prefix("PLAN_MARSHALL").separator("__"));

    let merged = builder
        .build()
        .map_err(|e| Error::Other(format!("failed to layer marshal.json configuration: {e}")))?;
    let value: Value = merged
        .try_deserialize()
        .map_err(|e| Error::Other(format!("failed to merge marshal.json configuration: {e}")))?;

    validate(&value)?;
    serde_json::from_value(value).map_err(|e| Error::Serialization {
        what: "marshal.json".to_string(),
        source: e,
    })
}
