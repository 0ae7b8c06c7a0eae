//! `marshal` — the command-line entry point to the plan-marshall core.
//!
//! Primary surfaces: `marshal plan <subcommand> --plan-id <id>` drives a
//! plan through its seven-phase lifecycle; `marshal dispatch <notation>
//! <command> [args...]` routes a single notation-addressed skill invocation
//! through the dispatcher. `--trace-plan-id` propagates a logging context
//! without selecting the artifact store's scope.

use std::io::Read;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use plan_marshall::capability::CapabilityResolver;
use plan_marshall::error::Error;
use plan_marshall::store;
use plan_marshall::types::Phase;
use plan_marshall::{command_exec, dispatcher, phase};

/// Exit codes per the command-line surface contract.
mod exit {
    pub const SUCCESS: i32 = 0;
    pub const DOMAIN_ERROR: i32 = 1;
    pub const ENVIRONMENT_ERROR: i32 = 2;
    pub const TIMEOUT: i32 = 124;
}

#[derive(Parser)]
#[command(name = "marshal", version = plan_marshall::VERSION, about = "Structured-work orchestration core")]
struct Cli {
    /// Root directory holding `plans/`, `marshal.json`, and `run-configuration.json`.
    #[arg(long, global = true, default_value = ".")]
    base: PathBuf,

    /// Selects the plan a subcommand operates on.
    #[arg(long, global = true)]
    plan_id: Option<String>,

    /// Propagates a logging context without selecting scope.
    #[arg(long, global = true)]
    trace_plan_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a plan and carry it through init/refine/outline/plan/execute/verify/finalize.
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },
    /// Route `<notation> <command> [args...]` through the dispatch table.
    Dispatch(DispatchArgs),
}

#[derive(Subcommand)]
enum PlanAction {
    /// Create a new plan directory and its original request.
    New {
        /// Request text. Omit to read a heredoc-style document from stdin.
        #[arg(long)]
        request: Option<String>,
        /// Domains this plan's references start with.
        #[arg(long, value_delimiter = ',')]
        domains: Vec<String>,
    },
    /// Record the clarified request produced by the refine phase.
    Refine {
        #[arg(long)]
        clarified: Option<String>,
    },
    /// Enter a phase (transition `pending` to `in_progress`).
    Enter { phase: PhaseArg },
    /// Attempt to close a phase; reports whether a Q-Gate or approval is pending.
    Close { phase: PhaseArg },
    /// The mandatory outline approval step.
    ApproveOutline {
        #[arg(long, default_value_t = 1)]
        attempt: u32,
    },
    /// Expand the approved outline into a task DAG.
    RunPlan,
    /// Walk the task DAG, running each automated task's verification command.
    RunExecute {
        #[arg(long, default_value = ".")]
        working_dir: PathBuf,
        #[arg(long, default_value_t = phase::DEFAULT_EXECUTE_RETRY_CAP)]
        retry_cap: u32,
    },
    /// Run every deliverable's verification command and drive the fix loop.
    RunVerify {
        #[arg(long, default_value = ".")]
        working_dir: PathBuf,
        #[arg(long, default_value_t = phase::DEFAULT_VERIFY_FIX_CAP)]
        fix_cap: u32,
    },
    /// Close out the plan's terminal phase.
    RunFinalize,
    /// Print the plan's current phase and per-phase status.
    Status,
}

#[derive(Clone)]
struct PhaseArg(Phase);

impl std::str::FromStr for PhaseArg {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::from_str(s)
            .or_else(|| Phase::all().into_iter().find(|p| p.display_name().eq_ignore_ascii_case(s)))
            .map(PhaseArg)
            .ok_or_else(|| format!("`{s}` is not a recognized phase"))
    }
}

#[derive(Args)]
struct DispatchArgs {
    /// `<bundle>:<skill>:<script>` notation.
    notation: String,
    /// Command verb passed to the resolved script.
    command: String,
    /// Remaining arguments, forwarded verbatim.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
    #[arg(long, default_value = "scripts")]
    scripts_root: PathBuf,
    #[arg(long, default_value = ".")]
    working_dir: PathBuf,
    #[arg(long, default_value_t = 300)]
    timeout_seconds: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let base = cli.base.as_path();
    let plan_id = cli.plan_id.as_deref().or(cli.trace_plan_id.as_deref());

    let result = match cli.command {
        Command::Plan { action } => {
            let Some(plan_id) = plan_id else {
                eprintln!("marshal plan: --plan-id is required");
                return exit::DOMAIN_ERROR;
            };
            run_plan_action(base, plan_id, action)
        }
        Command::Dispatch(args) => run_dispatch(base, plan_id, args),
    };

    match result {
        Ok(RunOutcome::Exit(code)) => code,
        Ok(RunOutcome::Printed) => exit::SUCCESS,
        Err(err) => {
            eprintln!("marshal: {err}");
            exit_code_for(&err)
        }
    }
}

enum RunOutcome {
    Printed,
    Exit(i32),
}

fn run_plan_action(base: &std::path::Path, plan_id: &str, action: PlanAction) -> plan_marshall::Result<RunOutcome> {
    match action {
        PlanAction::New { request, domains } => {
            let text = match request {
                Some(text) => text,
                None => read_stdin_document()?,
            };
            store::plan::create(base, plan_id)?;
            store::request::create(base, plan_id, &text)?;
            store::references::create(base, plan_id, domains)?;
            println!("created plan `{plan_id}`");
            Ok(RunOutcome::Printed)
        }
        PlanAction::Refine { clarified } => {
            let text = match clarified {
                Some(text) => text,
                None => read_stdin_document()?,
            };
            store::request::clarify(base, plan_id, &text)?;
            println!("recorded clarified request for `{plan_id}`");
            Ok(RunOutcome::Printed)
        }
        PlanAction::Enter { phase: PhaseArg(p) } => {
            phase::enter(base, plan_id, p)?;
            println!("{} entered", p.display_name());
            Ok(RunOutcome::Printed)
        }
        PlanAction::Close { phase: PhaseArg(p) } => match phase::try_close(base, plan_id, p)? {
            phase::PhaseOutcome::Done(plan) => {
                println!("{} closed (current phase: {})", p.display_name(), plan.current_phase().display_name());
                Ok(RunOutcome::Printed)
            }
            phase::PhaseOutcome::AwaitingQGate(findings) => {
                println!("{} has {} pending Q-Gate finding(s)", p.display_name(), findings.len());
                for finding in &findings {
                    println!("  - [{}] {}", finding.severity, finding.title);
                }
                Ok(RunOutcome::Exit(exit::DOMAIN_ERROR))
            }
            phase::PhaseOutcome::AwaitingUserApproval => {
                println!("{} Q-Gate is clear; awaiting `approve-outline`", p.display_name());
                Ok(RunOutcome::Exit(exit::DOMAIN_ERROR))
            }
        },
        PlanAction::ApproveOutline { attempt } => {
            phase::approve_outline(base, plan_id, attempt)?;
            println!("outline approved");
            Ok(RunOutcome::Printed)
        }
        PlanAction::RunPlan => {
            let capability = CapabilityResolver::load(base)?;
            let tasks = phase::run_plan_phase(base, plan_id, &capability)?;
            println!("expanded {} task(s)", tasks.len());
            Ok(RunOutcome::Printed)
        }
        PlanAction::RunExecute { working_dir, retry_cap } => {
            let tasks = phase::run_execute_phase(base, plan_id, &working_dir, retry_cap)?;
            let blocked = tasks
                .iter()
                .filter(|t| t.status == plan_marshall::types::TaskStatus::Blocked)
                .count();
            println!("ran {} task(s), {blocked} blocked", tasks.len());
            if blocked > 0 {
                return Ok(RunOutcome::Exit(exit::DOMAIN_ERROR));
            }
            Ok(RunOutcome::Printed)
        }
        PlanAction::RunVerify { working_dir, fix_cap } => {
            let findings = phase::run_verify_phase(base, plan_id, &working_dir, fix_cap)?;
            if findings.is_empty() {
                println!("verify passed");
                Ok(RunOutcome::Printed)
            } else {
                println!("verify has {} unresolved finding(s)", findings.len());
                Ok(RunOutcome::Exit(exit::DOMAIN_ERROR))
            }
        }
        PlanAction::RunFinalize => {
            phase::run_finalize_phase(base, plan_id)?;
            println!("plan finalized");
            Ok(RunOutcome::Printed)
        }
        PlanAction::Status => {
            let plan = store::plan::read(base, plan_id)?;
            println!("plan `{plan_id}`: current phase {}", plan.current_phase().display_name());
            for p in Phase::all() {
                println!("  {:<9} {}", p.display_name(), plan.status_of(p).as_str());
            }
            Ok(RunOutcome::Printed)
        }
    }
}

fn run_dispatch(base: &std::path::Path, plan_id: Option<&str>, args: DispatchArgs) -> plan_marshall::Result<RunOutcome> {
    let plan_id = plan_id.unwrap_or("global");
    let result = dispatcher::dispatch(
        base,
        plan_id,
        &args.scripts_root,
        &args.notation,
        &args.command,
        &args.args,
        &args.working_dir,
        args.timeout_seconds,
    )?;

    let rendered = phase::render_task_output(base, &args.notation, &result)?;
    if !rendered.is_empty() {
        println!("{rendered}");
    }

    Ok(RunOutcome::Exit(match result.status {
        command_exec::RunStatus::Timeout => exit::TIMEOUT,
        command_exec::RunStatus::Success => exit::SUCCESS,
        command_exec::RunStatus::Error => result.exit_code,
    }))
}

fn read_stdin_document() -> plan_marshall::Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf).map_err(|e| Error::Io {
        path: PathBuf::from("<stdin>"),
        source: e,
    })?;
    Ok(buf.trim_end().to_string())
}

fn exit_code_for(err: &Error) -> i32 {
    match err {
        Error::Timeout { .. } => exit::TIMEOUT,
        Error::LockTimeout { .. } | Error::Io { .. } => exit::ENVIRONMENT_ERROR,
        _ => exit::DOMAIN_ERROR,
    }
}
