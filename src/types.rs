//! Core enumerations shared across the plan lifecycle.
//!
//! These are the small, closed vocabularies referenced by the artifact
//! store, the phase state machine, and the task planner. Keeping them in
//! one place means a phase name or a task type is spelled the same way
//! everywhere it appears on disk.

use serde::{Deserialize, Serialize};

/// The seven ordered phases of a plan's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Init,
    Refine,
    Outline,
    Plan,
    Execute,
    Verify,
    Finalize,
}

impl Phase {
    /// All phases in their fixed declared order.
    pub fn all() -> [Self; 7] {
        [
            Self::Init,
            Self::Refine,
            Self::Outline,
            Self::Plan,
            Self::Execute,
            Self::Verify,
            Self::Finalize,
        ]
    }

    /// Index of this phase in the declared order (0-based).
    pub fn ordinal(&self) -> usize {
        Self::all().iter().position(|p| p == self).expect("phase in all()")
    }

    /// The phase that directly follows this one, if any.
    pub fn next(&self) -> Option<Self> {
        let all = Self::all();
        all.get(self.ordinal() + 1).copied()
    }

    /// Canonical on-disk / notation identifier, e.g. `"3-outline"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "1-init",
            Self::Refine => "2-refine",
            Self::Outline => "3-outline",
            Self::Plan => "4-plan",
            Self::Execute => "5-execute",
            Self::Verify => "6-verify",
            Self::Finalize => "7-finalize",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Refine => "Refine",
            Self::Outline => "Outline",
            Self::Plan => "Plan",
            Self::Execute => "Execute",
            Self::Verify => "Verify",
            Self::Finalize => "Finalize",
        }
    }

    /// Parse the canonical identifier back into a `Phase`.
    pub fn from_str(value: &str) -> Option<Self> {
        Self::all().into_iter().find(|p| p.as_str() == value)
    }

    /// Does this phase carry a Q-Gate?
    pub fn has_q_gate(&self) -> bool {
        matches!(self, Self::Outline | Self::Verify)
    }

    /// Does this phase require explicit user approval before advancing?
    pub fn requires_user_approval(&self) -> bool {
        matches!(self, Self::Outline)
    }
}

/// Status of a single phase within a plan's `phases[]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Done,
    Skipped,
    Failed,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Whether this status counts as "already passed" for ordering purposes.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }
}

/// The change a Deliverable represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Analysis,
    Feature,
    Enhancement,
    BugFix,
    TechDebt,
    Verification,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Feature => "feature",
            Self::Enhancement => "enhancement",
            Self::BugFix => "bug_fix",
            Self::TechDebt => "tech_debt",
            Self::Verification => "verification",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "analysis" => Some(Self::Analysis),
            "feature" => Some(Self::Feature),
            "enhancement" => Some(Self::Enhancement),
            "bug_fix" => Some(Self::BugFix),
            "tech_debt" => Some(Self::TechDebt),
            "verification" => Some(Self::Verification),
            _ => None,
        }
    }
}

/// How a Deliverable's work is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Automated,
    Manual,
    Mixed,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automated => "automated",
            Self::Manual => "manual",
            Self::Mixed => "mixed",
        }
    }
}

/// A task's role relative to its owning deliverable.
///
/// Drives which capability bundle is resolved via
/// [`crate::capability::CapabilityResolver::skills_by_profile`]. Projects may
/// declare arbitrary profile names in configuration, so this wraps a plain
/// string rather than a closed enum; `implementation` and `module_testing`
/// are the two names the core itself gives ordering semantics to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(String);

impl Profile {
    pub const IMPLEMENTATION: &'static str = "implementation";
    pub const MODULE_TESTING: &'static str = "module_testing";

    pub fn parse(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_implementation(&self) -> bool {
        self.0 == Self::IMPLEMENTATION
    }

    pub fn is_module_testing(&self) -> bool {
        self.0 == Self::MODULE_TESTING
    }

    /// IMPL-before-TEST tie-break ordinal used by the planner.
    pub fn ordering_key(&self) -> u8 {
        match self.0.as_str() {
            Self::IMPLEMENTATION => 0,
            Self::MODULE_TESTING => 1,
            _ => 2,
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task type, carried in both the task document and (per DESIGN.md's
/// resolution of the filename convention) implicitly by the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    Impl,
    Fix,
    Sonar,
    Pr,
    Lint,
    Sec,
    Doc,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Impl => "IMPL",
            Self::Fix => "FIX",
            Self::Sonar => "SONAR",
            Self::Pr => "PR",
            Self::Lint => "LINT",
            Self::Sec => "SEC",
            Self::Doc => "DOC",
        }
    }
}

/// Where a task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    Plan,
    Fix,
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
        }
    }
}

/// Status of an individual step within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Done,
    Skipped,
}

/// Certainty of an Assessment about whether a file belongs in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Certainty {
    CertainInclude,
    CertainExclude,
    Uncertain,
}

/// Resolution of a Q-Gate or review Finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingResolution {
    Pending,
    TakenIntoAccount,
    Dismissed,
    Deferred,
}

impl FindingResolution {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Where a Finding originated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSource {
    QGate,
    UserReview,
}

/// Compatibility posture recorded during `refine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    Breaking,
    Deprecation,
    SmartAndAsk,
}

/// Branching strategy recorded in per-plan configuration.
///
/// `new_branch` and `current_branch` are the two well-known strategies;
/// anything else is taken as an explicit branch name to reuse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchStrategy(String);

impl BranchStrategy {
    pub const NEW_BRANCH: &'static str = "new_branch";
    pub const CURRENT_BRANCH: &'static str = "current_branch";

    pub fn parse(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_new_branch(&self) -> bool {
        self.0 == Self::NEW_BRANCH
    }

    pub fn is_current_branch(&self) -> bool {
        self.0 == Self::CURRENT_BRANCH
    }

    pub fn explicit_name(&self) -> Option<&str> {
        (!self.is_new_branch() && !self.is_current_branch()).then_some(self.0.as_str())
    }
}

/// Track determined during `refine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Simple,
    Complex,
}

/// Scope estimate determined during `refine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeEstimate {
    SingleFile,
    SingleModule,
    FewFiles,
    MultiModule,
    CodebaseWide,
}

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Which logical log stream an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    Script,
    Work,
    Decision,
}

/// Category used on work-log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkLogCategory {
    Status,
    Artifact,
    Decision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_order_is_fixed() {
        let all = Phase::all();
        assert_eq!(all[0], Phase::Init);
        assert_eq!(all[6], Phase::Finalize);
        assert_eq!(all[0].next(), Some(Phase::Refine));
        assert_eq!(all[6].next(), None);
    }

    #[test]
    fn phase_round_trips_through_as_str() {
        for phase in Phase::all() {
            assert_eq!(Phase::from_str(phase.as_str()), Some(phase));
        }
    }

    #[test]
    fn only_outline_and_verify_carry_a_q_gate() {
        for phase in Phase::all() {
            assert_eq!(
                phase.has_q_gate(),
                matches!(phase, Phase::Outline | Phase::Verify)
            );
        }
    }

    #[test]
    fn profile_ordering_places_implementation_before_testing() {
        let impl_profile = Profile::parse(Profile::IMPLEMENTATION);
        let test_profile = Profile::parse(Profile::MODULE_TESTING);
        let other_profile = Profile::parse("lint");
        assert!(impl_profile.ordering_key() < test_profile.ordering_key());
        assert!(test_profile.ordering_key() < other_profile.ordering_key());
    }
}
