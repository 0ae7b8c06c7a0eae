//! A structured-work orchestration core: tracks a unit of work through a
//! fixed seven-phase lifecycle (init, refine, outline, plan, execute,
//! verify, finalize), persisting every artifact to a flat on-disk layout
//! and routing capability lookups and external command execution through
//! typed, testable components.
//!
//! The crate is organized around the components each phase leans on:
//!
//! - [`store`] — the Artifact Store: typed persistence for plans, requests,
//!   references, outlines, tasks, assessments, and findings.
//! - [`logging`] — the Logging Pipeline: durable, append-only
//!   script/work/decision logs with retention cleanup.
//! - [`command_exec`] — the Command Executor: a two-layer-timeout wrapper
//!   around external commands with pluggable output parsing.
//! - [`timeout_store`] — the Adaptive Timeout Store: per-command-key
//!   timeout memory that adapts toward observed durations.
//! - [`capability`] — the Capability Resolver: module-to-command and
//!   module-to-skill-bundle lookups over project configuration.
//! - [`phase`] — the Phase State Machine: lifecycle ordering, Q-Gate
//!   re-entry, and the mandatory outline approval gate.
//! - [`qgate`] — the Q-Gate Controller: the outline and verify phases'
//!   structural checks, expressed as idempotent findings.
//! - [`planner`] — the Task Planner: deliverable-to-task DAG expansion and
//!   parallel execution layering.
//! - [`dispatcher`] — the Dispatcher/Router: notation-addressed routing to
//!   registered skill scripts.
//!
//! [`types`] and [`toon`] are the shared vocabulary and on-disk encoding
//! those components build on; [`retry`] classifies and backs off from
//! their errors; [`error`] is the crate-wide error taxonomy.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod capability;
pub mod command_exec;
pub mod dispatcher;
pub mod error;
pub mod io;
pub mod logging;
pub mod phase;
pub mod planner;
pub mod qgate;
pub mod retry;
pub mod store;
pub mod timeout_store;
pub mod timing;
pub mod toon;
pub mod types;

pub use error::{Error, Result};
pub use timing::Timer;

/// Crate version, exposed for the `marshal` binary's `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
