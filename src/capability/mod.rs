//! The Capability Resolver: module-to-capability mappings and default
//! command recipes, read from the shared project configuration.
//!
//! Results are pure functions of configuration at call time. Shared config
//! (`marshal.json`, committed, project-wide) describes modules, their
//! capability commands, and skill bundles per profile. Local state
//! (`run-configuration.json`'s `profile_mappings`) takes precedence over
//! shared config for mapping decisions — everything else comes from shared
//! config only.

pub mod schema;

use std::path::Path;

use crate::error::{Error, Result};
use crate::store::config as run_config_store;

pub use schema::{AppSettings, MarshalConfig, ModuleCapabilities, RecipeConfig};

/// A resolved command for a given module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub executable: String,
    pub module: String,
    pub profile: String,
}

/// A resolved recipe: a deterministic, trusted procedure that produces
/// deliverables without discovery or Q-Gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecipe {
    pub recipe_skill: String,
    pub default_change_type: String,
    pub domain: String,
    pub profile: String,
    pub package_source: String,
}

/// The generic agent notation used when no domain-specific change-type
/// agent is registered.
pub const GENERIC_CHANGE_TYPE_AGENT: &str = "generic:change:implement";

/// Reads `marshal.json` plus the local `profile_mappings` from
/// `run-configuration.json` and answers capability-lookup queries.
pub struct CapabilityResolver {
    config: MarshalConfig,
    profile_mappings: std::collections::BTreeMap<String, String>,
}

impl CapabilityResolver {
    /// Load the resolver's state from `<base>/marshal.json` and
    /// `<base>/run-configuration.json`. A missing `marshal.json` is not an
    /// error — projects with no modules configured yet get an empty
    /// resolver rather than a hard failure.
    pub fn load(base: &Path) -> Result<Self> {
        let config = schema::load_marshal_config(base)?;
        let run_config = run_config_store::read_run_configuration(base)?;
        Ok(Self {
            config,
            profile_mappings: run_config.profile_mappings,
        })
    }

    pub fn from_config(config: MarshalConfig) -> Self {
        Self {
            config,
            profile_mappings: std::collections::BTreeMap::new(),
        }
    }

    /// `resolve(command, module) -> { executable, module, profile }`.
    /// `profile` here is the canonical profile the command is registered
    /// under (a module may expose `compile` only under `implementation`).
    pub fn resolve(&self, command: &str, module: &str) -> Result<ResolvedCommand> {
        let module_config = self.config.modules.get(module).ok_or_else(|| {
            Error::NotFound(format!("module `{module}` is not registered in marshal.json"))
        })?;
        let executable = module_config.commands.get(command).ok_or_else(|| {
            Error::NotFound(format!("module `{module}` has no command `{command}`"))
        })?;
        Ok(ResolvedCommand {
            executable: executable.clone(),
            module: module.to_string(),
            profile: module_config
                .skills_by_profile
                .keys()
                .next()
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// All modules that expose `command`, or every registered module when
    /// `command` is `None`.
    pub fn modules(&self, command: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = self
            .config
            .modules
            .iter()
            .filter(|(_, m)| command.is_none_or(|c| m.commands.contains_key(c)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Resolve the profile mapping for `module`/`profile`, honoring the
    /// local-state precedence rule: `run-configuration.json`'s
    /// `profile_mappings` override shared config when present.
    fn effective_profile(&self, module: &str, profile: &str) -> Option<String> {
        let key = format!("{module}:{profile}");
        self.profile_mappings.get(&key).cloned()
    }

    /// `skills_by_profile(module, profile) -> list of skill notations`.
    /// Returns an empty list (not an error) for a `skip`-mapped profile, so
    /// callers can treat "skip" and "no skills configured" uniformly.
    pub fn skills_by_profile(&self, module: &str, profile: &str) -> Result<Vec<String>> {
        if self.effective_profile(module, profile).as_deref() == Some("skip") {
            return Ok(Vec::new());
        }
        let module_config = self.config.modules.get(module).ok_or_else(|| {
            Error::NotFound(format!("module `{module}` is not registered in marshal.json"))
        })?;
        Ok(module_config
            .skills_by_profile
            .get(profile)
            .cloned()
            .unwrap_or_default())
    }

    /// `resolve_recipe(recipe_key) -> { recipe_skill, default_change_type, domain, profile, package_source }`.
    pub fn resolve_recipe(&self, recipe_key: &str) -> Result<ResolvedRecipe> {
        let recipe = self
            .config
            .recipes
            .get(recipe_key)
            .ok_or_else(|| Error::NotFound(format!("recipe `{recipe_key}` is not registered")))?;
        Ok(ResolvedRecipe {
            recipe_skill: recipe.recipe_skill.clone(),
            default_change_type: recipe.default_change_type.clone(),
            domain: recipe.domain.clone(),
            profile: recipe.profile.clone(),
            package_source: recipe.package_source.clone(),
        })
    }

    /// `resolve_change_type_agent(domain, change_type) -> agent_notation`,
    /// falling back to [`GENERIC_CHANGE_TYPE_AGENT`] when no domain-specific
    /// agent is registered.
    pub fn resolve_change_type_agent(&self, domain: &str, change_type: &str) -> String {
        self.config
            .change_type_agents
            .get(&format!("{domain}:{change_type}"))
            .cloned()
            .unwrap_or_else(|| GENERIC_CHANGE_TYPE_AGENT.to_string())
    }

    /// The operational tunables layered in from `marshal.json`'s `app`
    /// section and `PLAN_MARSHALL__APP__*` environment overrides.
    pub fn app_settings(&self) -> &schema::AppSettings {
        &self.config.app
    }
}
