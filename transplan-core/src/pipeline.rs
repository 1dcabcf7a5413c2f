//! Per-target pipeline: plan request, plan import, reconciliation, flag
//! propagation and scheduling of the copy and transform steps.
//!
//! These entry points are I/O-agnostic: processes and files are reached
//! only through the port traits. A failure at any point returns an error
//! and drops the target being reconciled, so no half-updated target escapes.

use crate::commands::{Invocation, plan_invocation, transform_invocation};
use crate::error::{Phase, ToolError};
use crate::ports::{CommandInvoker, FilePort};
use crate::settings::TransplanSettings;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use transplan_domain::{CopyAction, DomainError, ReconcileOptions, propagate_flags, reconcile};
use transplan_plan::{PlanFormat, parse_plan};
use transplan_types::graph::{BuildGraph, BuildStep, StepKind};
use transplan_types::plan::TransformPlan;
use transplan_types::report::{PlanRef, ReconcileSummary, TargetReport, TargetState, ToolInfo};
use transplan_types::target::{BuildTarget, PlacementMode};

/// A plan together with where it came from.
#[derive(Debug, Clone)]
pub struct ImportedPlan {
    pub plan: TransformPlan,
    pub source: PlanRef,
}

/// Outcome of a successful target run.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: BuildTarget,
    pub graph: BuildGraph,
    pub report: TargetReport,
    pub plan: TransformPlan,
}

/// Records the visited states and refuses out-of-order transitions.
struct StateTracker {
    target: String,
    states: Vec<TargetState>,
}

impl StateTracker {
    fn new(target: &str) -> Self {
        debug!(target, state = TargetState::ConfigLoaded.as_str(), "target state");
        Self {
            target: target.to_string(),
            states: vec![TargetState::ConfigLoaded],
        }
    }

    fn current(&self) -> TargetState {
        self.states
            .last()
            .copied()
            .unwrap_or(TargetState::ConfigLoaded)
    }

    fn advance(&mut self, next: TargetState) -> Result<(), ToolError> {
        let current = self.current();
        if !current.can_advance_to(next) {
            return Err(ToolError::Internal(anyhow::anyhow!(
                "target {}: invalid state transition {} -> {}",
                self.target,
                current.as_str(),
                next.as_str()
            )));
        }
        debug!(target = %self.target, state = next.as_str(), "target state");
        self.states.push(next);
        Ok(())
    }
}

/// Invoke the plan phase for `target` and import the artifact it writes.
pub fn run_plan_phase(
    target: &BuildTarget,
    settings: &TransplanSettings,
    invoker: &dyn CommandInvoker,
    files: &dyn FilePort,
) -> Result<ImportedPlan, ToolError> {
    settings.validate(&target.name)?;
    request_plan(target, settings, invoker, files)
}

fn request_plan(
    target: &BuildTarget,
    settings: &TransplanSettings,
    invoker: &dyn CommandInvoker,
    files: &dyn FilePort,
) -> Result<ImportedPlan, ToolError> {
    let plan_file = settings.target.plan_file_for(&target.name);
    let callgraph = settings.target.callgraph_file_for(&target.name);

    files
        .create_dir_all(&settings.target.build_dir)
        .map_err(|e| file_error(&settings.target.build_dir, e))?;

    let sources = if settings.target.plan_sources.is_empty() {
        target.sources.as_slice()
    } else {
        settings.target.plan_sources.as_slice()
    };
    let invocation = plan_invocation(settings, sources, &plan_file, callgraph.as_deref());
    run_invocation(invoker, &invocation, Phase::Plan)?;

    import_plan(&plan_file, files)
}

/// Read and validate a plan artifact, recording its digest.
pub fn import_plan(path: &Utf8Path, files: &dyn FilePort) -> Result<ImportedPlan, ToolError> {
    let bytes = files.read_file(path).map_err(|e| file_error(path, e))?;
    let text = String::from_utf8(bytes).map_err(|e| ToolError::MalformedPlan {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let plan = parse_plan(&text, PlanFormat::from_path(path)).map_err(|e| {
        ToolError::MalformedPlan {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    info!(
        path = %path,
        transform = plan.transform().len(),
        remove = plan.remove().len(),
        "plan imported"
    );
    Ok(ImportedPlan {
        plan,
        source: PlanRef {
            path: path.to_string(),
            sha256: Some(sha256_hex(text.as_bytes())),
        },
    })
}

/// Full per-target pipeline starting with a plan-phase invocation.
pub fn run_target(
    target: BuildTarget,
    settings: &TransplanSettings,
    invoker: &dyn CommandInvoker,
    files: &dyn FilePort,
    tool: ToolInfo,
) -> Result<TargetOutcome, ToolError> {
    settings.validate(&target.name)?;
    let mut states = StateTracker::new(&target.name);

    states.advance(TargetState::PlanRequested)?;
    let imported = request_plan(&target, settings, invoker, files)?;
    states.advance(TargetState::PlanImported)?;

    finish_target(target, imported, settings, tool, states)
}

/// Reconcile `target` against a plan produced by an earlier run.
///
/// Nothing is written: copies and the rewrite are only declared in the
/// returned graph.
pub fn reconcile_target(
    target: BuildTarget,
    imported: ImportedPlan,
    settings: &TransplanSettings,
    tool: ToolInfo,
) -> Result<TargetOutcome, ToolError> {
    settings.validate(&target.name)?;
    let mut states = StateTracker::new(&target.name);
    states.advance(TargetState::PlanImported)?;

    finish_target(target, imported, settings, tool, states)
}

fn finish_target(
    mut target: BuildTarget,
    imported: ImportedPlan,
    settings: &TransplanSettings,
    tool: ToolInfo,
    mut states: StateTracker,
) -> Result<TargetOutcome, ToolError> {
    let ImportedPlan { plan, source } = imported;
    let target_settings = &settings.target;
    let base = target_settings.source_root.as_deref();
    let output_dir = target_settings.output_dir().to_path_buf();

    let opts = ReconcileOptions {
        mode: target_settings.placement,
        output_dir: output_dir.clone(),
        source_root: target_settings.source_root.clone(),
        removal_match: target_settings.removal_match,
        collision: target_settings.collision,
    };
    let sources_before = target.sources.len();
    let outcome = reconcile(&target.sources, &plan, &opts)
        .map_err(|e| domain_error(e, &source.path))?;

    let mut graph = BuildGraph::default();
    for (index, copy) in outcome.copies.iter().enumerate() {
        graph.push(copy_step(&target.name, index + 1, copy, base));
    }
    if !outcome.copies.is_empty() {
        info!(target = %target.name, copies = outcome.copies.len(), "copy steps scheduled");
    }

    if outcome.transform_required {
        let invocation = transform_invocation(settings, &plan, &output_dir);
        let mut step = invocation.to_step(format!("transform-{}", target.name), StepKind::Transform);
        step.description = Some(format!(
            "transform {} source(s) of {}",
            plan.transform().len(),
            target.name
        ));
        info!(target = %target.name, outputs = step.outputs.len(), "transform step scheduled");
        graph.push(step);
        states.advance(TargetState::TransformScheduled)?;
    } else {
        info!(target = %target.name, "nothing to regenerate; transform skipped");
        states.advance(TargetState::Skipped)?;
    }

    target.replace_sources(outcome.sources.clone());
    for generated in &outcome.generated {
        target.mark_generated(generated.clone());
    }
    states.advance(TargetState::SourcesReconciled)?;

    let mut propagated = propagate_flags(&target.flags, plan.pairs(), base);
    let mut flags_propagated = propagated.propagated.len();
    if target_settings.placement == PlacementMode::CopyUnmodified {
        propagated = propagate_flags(&propagated.flags, outcome.copy_pairs(), base);
        flags_propagated += propagated.propagated.len();
    }
    target.flags = propagated.flags;
    states.advance(TargetState::FlagsPropagated)?;
    states.advance(TargetState::Done)?;

    let summary = ReconcileSummary {
        sources_before: sources_before as u64,
        removed: outcome.removed.len() as u64,
        transformed: outcome.dropped_originals.len() as u64,
        copied: outcome.copies.len() as u64,
        appended: outcome.appended.len() as u64,
        sources_after: target.sources.len() as u64,
        flags_propagated: flags_propagated as u64,
    };
    info!(
        target = %target.name,
        before = summary.sources_before,
        after = summary.sources_after,
        "target reconciled"
    );

    let report = TargetReport {
        schema: transplan_types::schema::TRANSPLAN_REPORT_V1.to_string(),
        tool,
        target: target.name.clone(),
        plan: source,
        placement: target_settings.placement,
        transform_scheduled: outcome.transform_required,
        states: states.states,
        summary,
        generated_at: Utc::now().to_rfc3339(),
    };

    Ok(TargetOutcome {
        target,
        graph,
        report,
        plan,
    })
}

/// Declared duplicate of one retained source. The input is resolved so the
/// step does not depend on the source root.
fn copy_step(
    target: &str,
    index: usize,
    copy: &CopyAction,
    base: Option<&Utf8Path>,
) -> BuildStep {
    let from = copy.from.resolve(base);
    BuildStep {
        name: format!("copy-{}-{}", target, index),
        kind: StepKind::Copy,
        argv: Vec::new(),
        description: Some(format!("copy {} to {}", from, copy.to)),
        inputs: vec![from],
        outputs: vec![copy.to.clone()],
        working_dir: None,
        env: Default::default(),
    }
}

/// Run declared steps in order. Stops at the first failure.
///
/// Transform steps go through `invoker`; copy steps through `files`.
pub fn execute_graph(
    graph: &BuildGraph,
    invoker: &dyn CommandInvoker,
    files: &dyn FilePort,
) -> Result<usize, ToolError> {
    for step in &graph.steps {
        info!(step = %step.name, "executing step");
        match step.kind {
            StepKind::Transform => {
                let invocation = Invocation::from_step(step)?;
                run_invocation(invoker, &invocation, Phase::Transform)?;
            }
            StepKind::Copy => run_copy(step, files)?,
        }
    }
    Ok(graph.steps.len())
}

fn run_copy(step: &BuildStep, files: &dyn FilePort) -> Result<(), ToolError> {
    let ([from], [to]) = (step.inputs.as_slice(), step.outputs.as_slice()) else {
        return Err(ToolError::Configuration(format!(
            "copy step '{}' needs exactly one input and one output",
            step.name
        )));
    };
    debug!(from = %from, to = %to, "copying unmodified source");
    files
        .copy_file(from.as_path(), to.as_path())
        .map_err(|e| file_error(from.as_path(), e))
}

/// Write `target.json`, `steps.json` and `report.json` to `out_dir`.
pub fn write_target_artifacts(
    outcome: &TargetOutcome,
    out_dir: &Utf8Path,
    files: &dyn FilePort,
) -> anyhow::Result<()> {
    files.create_dir_all(out_dir)?;

    let target_json =
        serde_json::to_string_pretty(&outcome.target).context("serialize target")?;
    files.write_file(&out_dir.join("target.json"), target_json.as_bytes())?;

    let steps_json = serde_json::to_string_pretty(&outcome.graph).context("serialize steps")?;
    files.write_file(&out_dir.join("steps.json"), steps_json.as_bytes())?;

    let report_json =
        serde_json::to_string_pretty(&outcome.report).context("serialize report")?;
    files.write_file(&out_dir.join("report.json"), report_json.as_bytes())?;

    Ok(())
}

fn run_invocation(
    invoker: &dyn CommandInvoker,
    invocation: &Invocation,
    phase: Phase,
) -> Result<(), ToolError> {
    let output = invoker
        .invoke(invocation)
        .map_err(|e| ToolError::ExternalTool {
            phase,
            exit_code: None,
            diagnostics: format!("{:#}", e),
        })?;
    if !output.is_success() {
        return Err(ToolError::ExternalTool {
            phase,
            exit_code: output.exit_code,
            diagnostics: output.diagnostics(),
        });
    }
    Ok(())
}

fn file_error(path: &Utf8Path, err: anyhow::Error) -> ToolError {
    ToolError::FileOperation {
        path: path.to_path_buf(),
        message: format!("{:#}", err),
    }
}

fn domain_error(err: DomainError, plan_path: &str) -> ToolError {
    match err {
        DomainError::InvalidPattern { .. } => ToolError::MalformedPlan {
            path: Utf8PathBuf::from(plan_path),
            message: err.to_string(),
        },
        DomainError::CopyCollision {
            ref destination, ..
        } => ToolError::FileOperation {
            path: destination.as_path().to_path_buf(),
            message: err.to_string(),
        },
        DomainError::InvalidSource { ref id } => ToolError::FileOperation {
            path: id.as_path().to_path_buf(),
            message: err.to_string(),
        },
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
