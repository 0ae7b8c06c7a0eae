//! The Artifact Store: typed, file-backed persistence for all plan data.
//!
//! Every document type gets its own operations module. Raw file access to
//! plan directories by callers outside this module is forbidden by contract
//! — everything goes through [`io::atomic`]/[`io::lock`] here.

pub mod assessment;
pub mod config;
pub mod finding;
pub mod outline;
pub mod paths;
pub mod plan;
pub mod references;
pub mod request;
pub mod schema;
pub mod task;

pub use schema::{
    Assessment, CiState, CommandKeyState, Deliverable, DeliverableVerification, Finding,
    LastExecution, LogEntry, Plan, PlanConfiguration, References, Request, RunConfiguration,
    SolutionOutline, Step, Task, TaskVerification,
};
