mod config;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{CliOverrides, ConfigMerger};
use fs_err as fs;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use transplan_core::adapters::{FsFilePort, ProcessInvoker};
use transplan_core::commands::{CommandKind, Frontend};
use transplan_core::pipeline::{
    TargetOutcome, execute_graph, import_plan, reconcile_target, run_plan_phase, run_target,
    write_target_artifacts,
};
use transplan_core::settings::TransplanSettings;
use transplan_core::{CollisionPolicy, RemovalMatch, ToolError};
use transplan_types::graph::BuildGraph;
use transplan_types::report::ToolInfo;
use transplan_types::target::{BuildTarget, PlacementMode};
use transplan_types::wire::PlanV1;

#[derive(Debug, Parser)]
#[command(
    name = "transplan",
    version,
    about = "Plan-driven source transformation and build-target reconciliation."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the plan phase for a target and write the plan artifact.
    Plan(PlanArgs),
    /// Reconcile a target against an existing plan artifact.
    Reconcile(ReconcileArgs),
    /// Request a plan, reconcile the target and schedule the transform phase.
    Transform(TransformArgs),
    /// Print a plan artifact.
    ShowPlan(ShowPlanArgs),
    /// Execute a steps.json build graph in order.
    RunSteps(RunStepsArgs),
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Target manifest (JSON with name, sources and optional flags).
    #[arg(long)]
    target: Utf8PathBuf,

    /// Directory searched for transplan.toml (default: current directory).
    #[arg(long, default_value = ".")]
    project_dir: Utf8PathBuf,

    /// Explicit transplan.toml path (skips discovery).
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Transformation tool executable.
    #[arg(long, env = "TRANSPLAN_PROGRAM")]
    program: Option<String>,

    /// Argument placed before the subcommand, e.g. a script path. Repeatable.
    #[arg(long = "tool-arg", allow_hyphen_values = true)]
    tool_args: Vec<String>,

    /// Transform-phase subcommand.
    #[arg(long, value_enum)]
    command: Option<CommandArg>,

    /// Transformation mode.
    #[arg(long)]
    mode: Option<String>,

    /// Parallel-directive dialect.
    #[arg(long)]
    directive: Option<String>,

    /// Source-parsing front-end.
    #[arg(long, value_enum)]
    frontend: Option<FrontendArg>,

    /// Transformation config passed to the tool as --config.
    #[arg(long)]
    tool_config: Option<Utf8PathBuf>,

    /// Transform toggle to switch on (e.g. cpp, inline-members). Repeatable.
    #[arg(long = "enable")]
    toggles: Vec<String>,

    #[arg(long = "header")]
    headers: Vec<String>,

    #[arg(long = "include")]
    includes: Vec<String>,

    #[arg(long = "define")]
    defines: Vec<String>,

    #[arg(long = "xmod")]
    xmods: Vec<String>,

    /// Where retained sources are compiled from.
    #[arg(long, value_enum)]
    placement: Option<PlacementArg>,

    /// Destination of rewritten and copied files (default: build dir).
    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,

    /// Copy collision policy for copy-unmodified placement.
    #[arg(long, value_enum)]
    collision: Option<CollisionArg>,

    /// How plan removal patterns select sources.
    #[arg(long, value_enum)]
    removal_match: Option<RemovalMatchArg>,

    /// Directory for intermediate artifacts (default: build).
    #[arg(long)]
    build_dir: Option<Utf8PathBuf>,

    /// Source root; the plan phase then emits relative paths.
    #[arg(long)]
    source_root: Option<Utf8PathBuf>,

    /// Explicit plan-phase source. Repeatable.
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Plan artifact path (default: <build_dir>/<target>.plan.json).
    #[arg(long)]
    plan_file: Option<Utf8PathBuf>,

    /// Also request a call-graph artifact.
    #[arg(long, default_value_t = false)]
    callgraph: bool,
}

impl TargetArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            program: self.program.clone(),
            tool_args: self.tool_args.clone(),
            command: self.command.map(Into::into),
            mode: self.mode.clone(),
            directive: self.directive.clone(),
            frontend: self.frontend.map(Into::into),
            tool_config: self.tool_config.clone(),
            toggles: self.toggles.clone(),
            headers: self.headers.clone(),
            includes: self.includes.clone(),
            defines: self.defines.clone(),
            xmods: self.xmods.clone(),
            placement: self.placement.map(Into::into),
            output_dir: self.output_dir.clone(),
            collision: self.collision.map(Into::into),
            removal_match: self.removal_match.map(Into::into),
            build_dir: self.build_dir.clone(),
            source_root: self.source_root.clone(),
            sources: self.sources.clone(),
            plan_file: self.plan_file.clone(),
            callgraph: self.callgraph,
        }
    }
}

#[derive(Debug, Parser)]
struct PlanArgs {
    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Debug, Parser)]
struct ReconcileArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Existing plan artifact (.json or .cmake).
    #[arg(long)]
    plan: Utf8PathBuf,

    /// Output directory for target.json, steps.json and report.json
    /// (default: <build_dir>/<target>).
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Parser)]
struct TransformArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Output directory for target.json, steps.json and report.json
    /// (default: <build_dir>/<target>).
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,

    /// Run the scheduled steps right away instead of leaving them to a build system.
    #[arg(long, default_value_t = false)]
    execute: bool,
}

#[derive(Debug, Parser)]
struct ShowPlanArgs {
    /// Plan artifact (.json or .cmake).
    path: Utf8PathBuf,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct RunStepsArgs {
    /// steps.json written by `reconcile` or `transform`.
    path: Utf8PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CommandArg {
    Convert,
    Transpile,
    Idem,
}

impl From<CommandArg> for CommandKind {
    fn from(value: CommandArg) -> Self {
        match value {
            CommandArg::Convert => CommandKind::Convert,
            CommandArg::Transpile => CommandKind::Transpile,
            CommandArg::Idem => CommandKind::Idem,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FrontendArg {
    Fp,
    Ofp,
    Omni,
}

impl From<FrontendArg> for Frontend {
    fn from(value: FrontendArg) -> Self {
        match value {
            FrontendArg::Fp => Frontend::Fp,
            FrontendArg::Ofp => Frontend::Ofp,
            FrontendArg::Omni => Frontend::Omni,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlacementArg {
    InPlace,
    CopyUnmodified,
}

impl From<PlacementArg> for PlacementMode {
    fn from(value: PlacementArg) -> Self {
        match value {
            PlacementArg::InPlace => PlacementMode::InPlace,
            PlacementArg::CopyUnmodified => PlacementMode::CopyUnmodified,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CollisionArg {
    Fail,
    Overwrite,
    PreserveSubpath,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(value: CollisionArg) -> Self {
        match value {
            CollisionArg::Fail => CollisionPolicy::Fail,
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
            CollisionArg::PreserveSubpath => CollisionPolicy::PreserveSubpath,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RemovalMatchArg {
    Regex,
    Exact,
}

impl From<RemovalMatchArg> for RemovalMatch {
    fn from(value: RemovalMatchArg) -> Self {
        match value {
            RemovalMatchArg::Regex => RemovalMatch::Regex,
            RemovalMatchArg::Exact => RemovalMatch::Exact,
        }
    }
}

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<ToolError>()
                .map(ToolError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn real_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args),
        Command::Reconcile(args) => cmd_reconcile(args),
        Command::Transform(args) => cmd_transform(args),
        Command::ShowPlan(args) => cmd_show_plan(args),
        Command::RunSteps(args) => cmd_run_steps(args),
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "transplan".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Load the target manifest and the merged settings for it.
fn load_inputs(args: &TargetArgs) -> Result<(BuildTarget, TransplanSettings), ToolError> {
    let file_config = config::load_or_default(&args.project_dir, args.config.as_deref())
        .map_err(|e| ToolError::Configuration(format!("{:#}", e)))?;
    let settings = ConfigMerger::new(file_config)
        .merge(args.overrides())
        .map_err(|e| ToolError::Configuration(format!("{:#}", e)))?;

    let target = load_target(&args.target)?;
    settings.validate(&target.name)?;
    debug!(
        target = %target.name,
        sources = target.sources.len(),
        placement = settings.target.placement.as_str(),
        "inputs loaded"
    );
    Ok((target, settings))
}

fn load_target(path: &Utf8Path) -> Result<BuildTarget, ToolError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ToolError::Configuration(format!("read target manifest: {}", e)))?;
    serde_json::from_str(&contents).map_err(|e| {
        ToolError::Configuration(format!("parse target manifest {}: {}", path, e))
    })
}

fn out_dir_for(
    explicit: Option<Utf8PathBuf>,
    settings: &TransplanSettings,
    target: &str,
) -> Utf8PathBuf {
    explicit.unwrap_or_else(|| settings.target.build_dir.join(target))
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let (target, settings) = load_inputs(&args.target)?;
    let imported = run_plan_phase(&target, &settings, &ProcessInvoker, &FsFilePort)?;

    println!("plan: {}", imported.source.path);
    println!("  transform: {}", imported.plan.transform().len());
    println!("  append:    {}", imported.plan.append().len());
    println!("  remove:    {}", imported.plan.remove().len());
    Ok(())
}

fn cmd_reconcile(args: ReconcileArgs) -> anyhow::Result<()> {
    let (target, settings) = load_inputs(&args.target)?;
    let out_dir = out_dir_for(args.out_dir, &settings, &target.name);

    let imported = import_plan(&args.plan, &FsFilePort)?;
    let outcome = reconcile_target(target, imported, &settings, tool_info())?;
    write_target_artifacts(&outcome, &out_dir, &FsFilePort)
        .with_context(|| format!("write artifacts to {}", out_dir))?;

    print_summary(&outcome, &out_dir);
    Ok(())
}

fn cmd_transform(args: TransformArgs) -> anyhow::Result<()> {
    let (target, settings) = load_inputs(&args.target)?;
    let out_dir = out_dir_for(args.out_dir, &settings, &target.name);

    let outcome = run_target(target, &settings, &ProcessInvoker, &FsFilePort, tool_info())?;
    write_target_artifacts(&outcome, &out_dir, &FsFilePort)
        .with_context(|| format!("write artifacts to {}", out_dir))?;
    print_summary(&outcome, &out_dir);

    if args.execute {
        let ran = execute_graph(&outcome.graph, &ProcessInvoker, &FsFilePort)?;
        info!(steps = ran, "scheduled steps executed");
        println!("executed {} step(s)", ran);
    }
    Ok(())
}

fn cmd_show_plan(args: ShowPlanArgs) -> anyhow::Result<()> {
    let imported = import_plan(&args.path, &FsFilePort)?;
    let plan = &imported.plan;

    match args.format {
        OutputFormat::Json => {
            let wire = PlanV1::from(plan);
            println!(
                "{}",
                serde_json::to_string_pretty(&wire).context("serialize plan")?
            );
        }
        OutputFormat::Text => {
            println!("transform ({}):", plan.transform().len());
            for (original, replacement) in plan.pairs() {
                println!("  {} -> {}", original, replacement);
            }
            println!("remove ({}):", plan.remove().len());
            for pattern in plan.remove() {
                println!("  {}", pattern);
            }
        }
    }
    Ok(())
}

fn cmd_run_steps(args: RunStepsArgs) -> anyhow::Result<()> {
    let contents =
        fs::read_to_string(&args.path).with_context(|| format!("read {}", args.path))?;
    let graph: BuildGraph =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", args.path))?;

    let ran = execute_graph(&graph, &ProcessInvoker, &FsFilePort)?;
    println!("executed {} step(s)", ran);
    Ok(())
}

fn print_summary(outcome: &TargetOutcome, out_dir: &Utf8Path) {
    let summary = &outcome.report.summary;
    println!("target: {}", outcome.target.name);
    println!(
        "  sources: {} -> {}",
        summary.sources_before, summary.sources_after
    );
    println!(
        "  removed: {}, transformed: {}, copied: {}, appended: {}",
        summary.removed, summary.transformed, summary.copied, summary.appended
    );
    println!(
        "  transform step: {}",
        if outcome.report.transform_scheduled {
            "scheduled"
        } else {
            "skipped"
        }
    );
    println!("  artifacts: {}", out_dir);
}
