//! Typed artifact schemas and their TOON/JSON/markdown (de)serializers.
//!
//! Each type owns its own on-disk encoding rather than leaking a single
//! generic serializer to callers, per the "typed printer and parser per
//! variant" design note: structured data goes through [`crate::toon`],
//! task documents are plain `serde_json`, and prose documents (request,
//! outline) are markdown with typed sections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::toon::{self, Writer};
use crate::types::{
    Certainty, ChangeType, Compatibility, ExecutionMode, FindingResolution, FindingSource, Phase,
    PhaseStatus, StepStatus, TaskOrigin, TaskStatus, TaskType,
};

/// One entry in a [`Plan`]'s `phases[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseEntry {
    pub phase: Phase,
    pub status: PhaseStatus,
}

/// A unit of work tracked end-to-end through the seven phases.
#[derive(Debug, Clone)]
pub struct Plan {
    pub plan_id: String,
    pub phases: Vec<PhaseEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub change_type: Option<ChangeType>,
    pub domains: Vec<String>,
}

impl Plan {
    pub fn new(plan_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            plan_id: plan_id.into(),
            phases: Phase::all()
                .into_iter()
                .map(|phase| PhaseEntry {
                    phase,
                    status: PhaseStatus::Pending,
                })
                .collect(),
            created_at: now,
            updated_at: now,
            change_type: None,
            domains: Vec::new(),
        }
    }

    /// The phase currently `in_progress`, or the first `pending` phase if
    /// none is (P1's second clause).
    pub fn current_phase(&self) -> Phase {
        self.phases
            .iter()
            .find(|e| e.status == PhaseStatus::InProgress)
            .or_else(|| self.phases.iter().find(|e| e.status == PhaseStatus::Pending))
            .map(|e| e.phase)
            .unwrap_or(Phase::Finalize)
    }

    pub fn status_of(&self, phase: Phase) -> PhaseStatus {
        self.phases
            .iter()
            .find(|e| e.phase == phase)
            .map(|e| e.status)
            .unwrap_or(PhaseStatus::Pending)
    }

    pub fn set_status(&mut self, phase: Phase, status: PhaseStatus) {
        if let Some(entry) = self.phases.iter_mut().find(|e| e.phase == phase) {
            entry.status = status;
        }
        self.updated_at = Utc::now();
    }

    /// P1: at most one phase is `in_progress`.
    pub fn at_most_one_in_progress(&self) -> bool {
        self.phases
            .iter()
            .filter(|e| e.status == PhaseStatus::InProgress)
            .count()
            <= 1
    }

    pub fn to_toon(&self) -> String {
        let mut w = Writer::new();
        w.field("plan_id", &self.plan_id)
            .field("current_phase", self.current_phase().as_str())
            .field("created_at", self.created_at.to_rfc3339())
            .field("updated_at", self.updated_at.to_rfc3339())
            .field_list("domains", &self.domains);
        if let Some(ct) = self.change_type {
            w.field("change_type", ct.as_str());
        }
        let rows: Vec<Vec<String>> = self
            .phases
            .iter()
            .map(|e| vec![e.phase.as_str().to_string(), e.status.as_str().to_string()])
            .collect();
        w.table("phases", &["phase", "status"], &rows);
        w.finish()
    }

    pub fn from_toon(text: &str) -> Result<Self> {
        let doc = toon::parse(text)?;
        let plan_id = doc.get_required("plan_id")?.to_string();
        let created_at = parse_timestamp(doc.get_required("created_at")?)?;
        let updated_at = parse_timestamp(doc.get_required("updated_at")?)?;
        let domains = doc.get_list("domains");
        let change_type = doc.get("change_type").and_then(ChangeType::from_str);

        let table = doc
            .table("phases")
            .ok_or_else(|| Error::InvariantViolation("status.toon missing phases[] table".into()))?;
        let mut phases = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let phase = Phase::from_str(&row[0]).ok_or_else(|| {
                Error::InvariantViolation(format!("unknown phase `{}` in status.toon", row[0]))
            })?;
            let status = parse_phase_status(&row[1])?;
            phases.push(PhaseEntry { phase, status });
        }

        Ok(Self {
            plan_id,
            phases,
            created_at,
            updated_at,
            change_type,
            domains,
        })
    }
}

fn parse_phase_status(value: &str) -> Result<PhaseStatus> {
    match value {
        "pending" => Ok(PhaseStatus::Pending),
        "in_progress" => Ok(PhaseStatus::InProgress),
        "done" => Ok(PhaseStatus::Done),
        "skipped" => Ok(PhaseStatus::Skipped),
        "failed" => Ok(PhaseStatus::Failed),
        other => Err(Error::InvariantViolation(format!("unknown phase status `{other}`"))),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvariantViolation(format!("bad timestamp `{value}`: {e}")))
}

/// The free-text originating description, stored as two
/// markdown sections in `request.md`.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub original: String,
    pub clarified_request: Option<String>,
}

impl Request {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("## Original\n\n{}\n", self.original.trim());
        if let Some(clarified) = &self.clarified_request {
            out.push_str(&format!("\n## Clarified\n\n{}\n", clarified.trim()));
        }
        out
    }

    pub fn from_markdown(text: &str) -> Self {
        let sections = split_markdown_sections(text);
        Self {
            original: sections.get("Original").cloned().unwrap_or_default(),
            clarified_request: sections.get("Clarified").cloned(),
        }
    }
}

/// Split a markdown document into `## Heading` sections.
fn split_markdown_sections(text: &str) -> std::collections::BTreeMap<String, String> {
    let mut sections = std::collections::BTreeMap::new();
    let mut current: Option<String> = None;
    let mut body = String::new();

    for line in text.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            if let Some(name) = current.take() {
                sections.insert(name, body.trim().to_string());
            }
            current = Some(heading.trim().to_string());
            body.clear();
        } else if current.is_some() {
            body.push_str(line);
            body.push('\n');
        }
    }
    if let Some(name) = current {
        sections.insert(name, body.trim().to_string());
    }
    sections
}

/// Typed reference bag populated incrementally across phases.
#[derive(Debug, Clone, Default)]
pub struct References {
    pub affected_files: Vec<String>,
    pub domains: Vec<String>,
    pub module_mapping: Option<String>,
    pub branch: Option<String>,
    pub issue_url: Option<String>,
}

impl References {
    pub fn to_toon(&self) -> String {
        let mut w = Writer::new();
        w.field_list("affected_files", &self.affected_files)
            .field_list("domains", &self.domains);
        if let Some(m) = &self.module_mapping {
            w.field("module_mapping", m);
        }
        if let Some(b) = &self.branch {
            w.field("branch", b);
        }
        if let Some(u) = &self.issue_url {
            w.field("issue_url", u);
        }
        w.finish()
    }

    pub fn from_toon(text: &str) -> Result<Self> {
        let doc = toon::parse(text)?;
        Ok(Self {
            affected_files: doc.get_list("affected_files"),
            domains: doc.get_list("domains"),
            module_mapping: doc.get("module_mapping").map(str::to_string),
            branch: doc.get("branch").map(str::to_string),
            issue_url: doc.get("issue_url").map(str::to_string),
        })
    }
}

/// Resolved verification command + acceptance criteria on a Deliverable.
#[derive(Debug, Clone, Default)]
pub struct DeliverableVerification {
    pub command: String,
    pub criteria: String,
}

/// One deliverable within a [`SolutionOutline`].
#[derive(Debug, Clone)]
pub struct Deliverable {
    pub number: u32,
    pub title: String,
    pub change_type: ChangeType,
    pub execution_mode: ExecutionMode,
    pub domain: String,
    pub module: String,
    pub depends: Vec<u32>,
    pub profiles: Vec<String>,
    pub affected_files: Vec<String>,
    pub change_per_file: String,
    pub verification: DeliverableVerification,
    pub success_criteria: Vec<String>,
}

/// The deliverables document (`solution_outline.md`).
#[derive(Debug, Clone, Default)]
pub struct SolutionOutline {
    pub plan_id: String,
    pub compatibility: Compatibility,
    pub compatibility_description: String,
    pub deliverables: Vec<Deliverable>,
}

impl Default for Compatibility {
    fn default() -> Self {
        Compatibility::SmartAndAsk
    }
}

impl SolutionOutline {
    /// The union of every deliverable's `affected_files`, deduplicated.
    /// Used to check the symmetric-file-sets Q-Gate.
    pub fn affected_files_union(&self) -> Vec<String> {
        let mut set: Vec<String> = self
            .deliverables
            .iter()
            .flat_map(|d| d.affected_files.iter().cloned())
            .collect();
        set.sort();
        set.dedup();
        set
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("plan_id: {}\n", self.plan_id));
        out.push_str(&format!(
            "compatibility: {} — {}\n\n",
            compatibility_str(self.compatibility),
            self.compatibility_description
        ));
        for d in &self.deliverables {
            out.push_str(&format!("### Deliverable {}: {}\n\n", d.number, d.title));
            out.push_str(&format!("- change_type: {}\n", d.change_type.as_str()));
            out.push_str(&format!("- execution_mode: {}\n", execution_mode_str(d.execution_mode)));
            out.push_str(&format!("- domain: {}\n", d.domain));
            out.push_str(&format!("- module: {}\n", d.module));
            out.push_str(&format!("- depends: {}\n", depends_str(&d.depends)));
            out.push_str(&format!("- profiles: {}\n", d.profiles.join(",")));
            out.push_str(&format!("- affected_files: {}\n", d.affected_files.join(",")));
            out.push_str(&format!("- change_per_file: {}\n", d.change_per_file));
            out.push_str(&format!("- verification.command: {}\n", d.verification.command));
            out.push_str(&format!("- verification.criteria: {}\n", d.verification.criteria));
            out.push_str(&format!(
                "- success_criteria: {}\n\n",
                d.success_criteria.join(";")
            ));
        }
        out
    }

    /// Parse a `solution_outline.md` document written by [`Self::to_markdown`].
    pub fn from_markdown(text: &str) -> Result<Self> {
        let mut plan_id = String::new();
        let mut compatibility = Compatibility::SmartAndAsk;
        let mut compatibility_description = String::new();
        let mut deliverables = Vec::new();
        let mut current: Option<(u32, String, std::collections::BTreeMap<String, String>)> = None;

        fn flush(
            current: Option<(u32, String, std::collections::BTreeMap<String, String>)>,
            deliverables: &mut Vec<Deliverable>,
        ) -> Result<()> {
            let Some((number, title, fields)) = current else {
                return Ok(());
            };
            let get = |key: &str| fields.get(key).cloned().unwrap_or_default();
            let change_type = ChangeType::from_str(&get("change_type")).ok_or_else(|| {
                Error::InvariantViolation(format!("deliverable {number} has unknown change_type"))
            })?;
            let execution_mode = match get("execution_mode").as_str() {
                "automated" => ExecutionMode::Automated,
                "manual" => ExecutionMode::Manual,
                "mixed" => ExecutionMode::Mixed,
                other => {
                    return Err(Error::InvariantViolation(format!(
                        "deliverable {number} has unknown execution_mode `{other}`"
                    )));
                }
            };
            let depends = match get("depends").as_str() {
                "" | "none" => Vec::new(),
                list => list
                    .split(',')
                    .map(|s| s.trim().parse::<u32>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| Error::InvariantViolation(format!("bad depends list: {e}")))?,
            };
            deliverables.push(Deliverable {
                number,
                title,
                change_type,
                execution_mode,
                domain: get("domain"),
                module: get("module"),
                depends,
                profiles: split_csv(&get("profiles")),
                affected_files: split_csv(&get("affected_files")),
                change_per_file: get("change_per_file"),
                verification: DeliverableVerification {
                    command: get("verification.command"),
                    criteria: get("verification.criteria"),
                },
                success_criteria: get("success_criteria")
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            });
            Ok(())
        }

        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("plan_id:") {
                plan_id = rest.trim().to_string();
            } else if let Some(rest) = trimmed.strip_prefix("compatibility:") {
                let (value, desc) = rest.split_once('—').unwrap_or((rest, ""));
                compatibility = match value.trim() {
                    "breaking" => Compatibility::Breaking,
                    "deprecation" => Compatibility::Deprecation,
                    _ => Compatibility::SmartAndAsk,
                };
                compatibility_description = desc.trim().to_string();
            } else if let Some(rest) = trimmed.strip_prefix("### Deliverable ") {
                flush(current.take(), &mut deliverables)?;
                let (num_str, title) = rest.split_once(':').unwrap_or((rest, ""));
                let number = num_str
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| Error::InvariantViolation(format!("bad deliverable number: {e}")))?;
                current = Some((number, title.trim().to_string(), std::collections::BTreeMap::new()));
            } else if let Some(rest) = trimmed.strip_prefix("- ") {
                if let Some((key, value)) = rest.split_once(':') {
                    if let Some((_, _, fields)) = current.as_mut() {
                        fields.insert(key.trim().to_string(), value.trim().to_string());
                    }
                }
            }
        }
        flush(current, &mut deliverables)?;

        Ok(Self {
            plan_id,
            compatibility,
            compatibility_description,
            deliverables,
        })
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn compatibility_str(c: Compatibility) -> &'static str {
    match c {
        Compatibility::Breaking => "breaking",
        Compatibility::Deprecation => "deprecation",
        Compatibility::SmartAndAsk => "smart_and_ask",
    }
}

fn execution_mode_str(m: ExecutionMode) -> &'static str {
    m.as_str()
}

fn depends_str(depends: &[u32]) -> String {
    if depends.is_empty() {
        "none".to_string()
    } else {
        depends.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
    }
}

/// An append-only entry recording whether a file belongs in the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub file_path: String,
    pub certainty: Certainty,
    pub confidence: u8,
    pub agent: String,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

/// A quality-gate observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub hash_id: String,
    pub phase: String,
    pub source: FindingSource,
    pub severity: String,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub resolution: FindingResolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Finding {
    /// `hash_id = stable-hash(phase, title, file_path, detail)`.
    pub fn compute_hash_id(phase: &str, title: &str, file_path: Option<&str>, detail: &str) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        phase.hash(&mut hasher);
        title.hash(&mut hasher);
        file_path.unwrap_or("").hash(&mut hasher);
        detail.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

/// A single ordered work item within a [`Task`]'s `steps[]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub file_path: String,
    pub description: String,
    pub status: StepStatus,
}

/// A task's verification contract.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskVerification {
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub criteria: String,
    #[serde(default)]
    pub manual: bool,
}

/// A committable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub number: u32,
    pub title: String,
    pub status: TaskStatus,
    pub phase: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub origin: TaskOrigin,
    pub deliverable: u32,
    pub domain: String,
    pub profile: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub description: String,
    pub steps: Vec<Step>,
    pub verification: TaskVerification,
    pub current_step: usize,
}

impl Task {
    /// P4: done only when every step is settled and verification passed at
    /// least once. Verification-pass is tracked by the caller (command
    /// executor) setting `verification_passed`; this helper checks the
    /// step half of the invariant.
    pub fn steps_settled(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s.status, StepStatus::Done | StepStatus::Skipped))
    }
}

/// Per-plan configuration.
#[derive(Debug, Clone, Default)]
pub struct PlanConfiguration {
    pub domains: Vec<String>,
    pub compatibility: Compatibility,
    pub create_pr: bool,
    pub verification_required: bool,
    pub branch_strategy: crate::types::BranchStrategy,
}

impl PlanConfiguration {
    pub fn to_toon(&self) -> String {
        let mut w = Writer::new();
        w.field_list("domains", &self.domains)
            .field("compatibility", compatibility_str(self.compatibility))
            .field("create_pr", self.create_pr.to_string())
            .field("verification_required", self.verification_required.to_string())
            .field("branch_strategy", self.branch_strategy.as_str());
        w.finish()
    }

    pub fn from_toon(text: &str) -> Result<Self> {
        let doc = toon::parse(text)?;
        let compatibility = match doc.get("compatibility") {
            Some("breaking") => Compatibility::Breaking,
            Some("deprecation") => Compatibility::Deprecation,
            _ => Compatibility::SmartAndAsk,
        };
        Ok(Self {
            domains: doc.get_list("domains"),
            compatibility,
            create_pr: doc.get("create_pr").is_some_and(|v| v == "true"),
            verification_required: doc
                .get("verification_required")
                .map(|v| v == "true")
                .unwrap_or(true),
            branch_strategy: crate::types::BranchStrategy::parse(
                doc.get("branch_strategy")
                    .unwrap_or(crate::types::BranchStrategy::NEW_BRANCH),
            ),
        })
    }
}

/// Last-execution memory for a single command key, backing the Adaptive Timeout Store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommandKeyState {
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub last_execution: Option<LastExecution>,
    #[serde(default)]
    pub acceptable_warnings: Vec<String>,
    #[serde(default)]
    pub skipped_files: Vec<String>,
    #[serde(default)]
    pub skipped_directories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastExecution {
    pub date: DateTime<Utc>,
    pub duration_seconds: u64,
    pub status: String,
}

/// Global run-configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunConfiguration {
    #[serde(default)]
    pub command_keys: std::collections::BTreeMap<String, CommandKeyState>,
    #[serde(default)]
    pub profile_mappings: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub ci: CiState,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CiState {
    #[serde(default)]
    pub git_present: bool,
    #[serde(default)]
    pub authenticated_tools: Vec<String>,
}

/// A structured log line.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: crate::types::LogLevel,
    pub category: String,
    pub caller: String,
    pub message: String,
}

impl LogEntry {
    /// `[ISO-8601-Z] [LEVEL] [CATEGORY] (caller) message`
    pub fn render(&self) -> String {
        format!(
            "[{}] [{}] [{}] ({}) {}",
            self.timestamp.to_rfc3339(),
            self.level.as_str(),
            self.category,
            self.caller,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_round_trips_through_toon() {
        let mut plan = Plan::new("add-login-page");
        plan.set_status(Phase::Init, PhaseStatus::Done);
        plan.set_status(Phase::Refine, PhaseStatus::InProgress);
        plan.domains.push("backend".to_string());

        let text = plan.to_toon();
        let parsed = Plan::from_toon(&text).unwrap();
        assert_eq!(parsed.plan_id, "add-login-page");
        assert_eq!(parsed.status_of(Phase::Init), PhaseStatus::Done);
        assert_eq!(parsed.current_phase(), Phase::Refine);
        assert_eq!(parsed.domains, vec!["backend"]);
    }

    #[test]
    fn plan_enforces_at_most_one_in_progress() {
        let mut plan = Plan::new("add-x");
        assert!(plan.at_most_one_in_progress());
        plan.set_status(Phase::Init, PhaseStatus::InProgress);
        plan.set_status(Phase::Refine, PhaseStatus::InProgress);
        assert!(!plan.at_most_one_in_progress());
    }

    #[test]
    fn request_round_trips_through_markdown() {
        let req = Request {
            original: "Add X".to_string(),
            clarified_request: Some("Add the X feature to the login page".to_string()),
        };
        let parsed = Request::from_markdown(&req.to_markdown());
        assert_eq!(parsed.original, "Add X");
        assert_eq!(
            parsed.clarified_request.as_deref(),
            Some("Add the X feature to the login page")
        );
    }

    #[test]
    fn references_round_trip_through_toon() {
        let refs = References {
            affected_files: vec!["a/b.rs".to_string(), "a/c.rs".to_string()],
            domains: vec!["backend".to_string()],
            module_mapping: Some("backend".to_string()),
            branch: None,
            issue_url: None,
        };
        let parsed = References::from_toon(&refs.to_toon()).unwrap();
        assert_eq!(parsed.affected_files, refs.affected_files);
        assert_eq!(parsed.module_mapping.as_deref(), Some("backend"));
    }

    #[test]
    fn finding_hash_id_is_stable_and_content_derived() {
        let a = Finding::compute_hash_id("3-outline", "symmetric file sets", Some("a/b.x"), "missing");
        let b = Finding::compute_hash_id("3-outline", "symmetric file sets", Some("a/b.x"), "missing");
        let c = Finding::compute_hash_id("3-outline", "symmetric file sets", Some("a/d.x"), "missing");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn outline_affected_files_union_deduplicates() {
        let outline = SolutionOutline {
            plan_id: "add-x".to_string(),
            deliverables: vec![
                Deliverable {
                    number: 1,
                    title: "A".to_string(),
                    change_type: ChangeType::Feature,
                    execution_mode: ExecutionMode::Automated,
                    domain: "backend".to_string(),
                    module: "backend".to_string(),
                    depends: vec![],
                    profiles: vec!["implementation".to_string()],
                    affected_files: vec!["a.rs".to_string(), "b.rs".to_string()],
                    change_per_file: String::new(),
                    verification: DeliverableVerification::default(),
                    success_criteria: vec![],
                },
                Deliverable {
                    number: 2,
                    title: "B".to_string(),
                    change_type: ChangeType::Feature,
                    execution_mode: ExecutionMode::Automated,
                    domain: "backend".to_string(),
                    module: "backend".to_string(),
                    depends: vec![1],
                    profiles: vec!["implementation".to_string()],
                    affected_files: vec!["b.rs".to_string(), "c.rs".to_string()],
                    change_per_file: String::new(),
                    verification: DeliverableVerification::default(),
                    success_criteria: vec![],
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            outline.affected_files_union(),
            vec!["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string()]
        );
    }

    #[test]
    fn outline_round_trips_through_markdown() {
        let outline = SolutionOutline {
            plan_id: "add-x".to_string(),
            compatibility: Compatibility::Breaking,
            compatibility_description: "removes a deprecated flag".to_string(),
            deliverables: vec![Deliverable {
                number: 1,
                title: "Add the endpoint".to_string(),
                change_type: ChangeType::Feature,
                execution_mode: ExecutionMode::Mixed,
                domain: "backend".to_string(),
                module: "api".to_string(),
                depends: vec![],
                profiles: vec!["implementation".to_string(), "module_testing".to_string()],
                affected_files: vec!["src/api.rs".to_string()],
                change_per_file: "add handler".to_string(),
                verification: DeliverableVerification {
                    command: "cargo test api".to_string(),
                    criteria: "exit 0".to_string(),
                },
                success_criteria: vec!["endpoint returns 200".to_string()],
            }],
        };

        let parsed = SolutionOutline::from_markdown(&outline.to_markdown()).unwrap();
        assert_eq!(parsed.plan_id, "add-x");
        assert_eq!(parsed.compatibility, Compatibility::Breaking);
        assert_eq!(parsed.deliverables.len(), 1);
        let d = &parsed.deliverables[0];
        assert_eq!(d.number, 1);
        assert_eq!(d.execution_mode, ExecutionMode::Mixed);
        assert_eq!(d.affected_files, vec!["src/api.rs".to_string()]);
        assert_eq!(d.success_criteria, vec!["endpoint returns 200".to_string()]);
    }
}
