//! Argument vectors for the two external phases.

use crate::error::ToolError;
use crate::settings::TransplanSettings;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use transplan_types::file::FileId;
use transplan_types::graph::{BuildStep, StepKind};
use transplan_types::plan::TransformPlan;

/// Transform-phase subcommand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// General-purpose rewrite.
    #[default]
    Convert,
    /// Rewrite to C.
    Transpile,
    /// Parse and regenerate unchanged, to check the round trip.
    Idem,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Convert => "convert",
            CommandKind::Transpile => "transpile",
            CommandKind::Idem => "idem",
        }
    }
}

/// Source-parsing front-end of the transformation tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frontend {
    #[default]
    Fp,
    Ofp,
    Omni,
}

impl Frontend {
    pub fn as_str(self) -> &'static str {
        match self {
            Frontend::Fp => "fp",
            Frontend::Ofp => "ofp",
            Frontend::Omni => "omni",
        }
    }
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external-process call with its declared file dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<Utf8PathBuf>,
    pub env: BTreeMap<String, String>,
    pub inputs: Vec<Utf8PathBuf>,
    pub outputs: Vec<Utf8PathBuf>,
}

impl Invocation {
    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Declare this invocation as a deferred build step.
    pub fn to_step(&self, name: impl Into<String>, kind: StepKind) -> BuildStep {
        BuildStep {
            name: name.into(),
            kind,
            argv: self.argv(),
            inputs: self.inputs.iter().cloned().map(FileId::from).collect(),
            outputs: self.outputs.iter().cloned().map(FileId::from).collect(),
            working_dir: self.working_dir.clone(),
            env: self.env.clone(),
            description: None,
        }
    }

    pub fn from_step(step: &BuildStep) -> Result<Self, ToolError> {
        let Some((program, args)) = step.argv.split_first() else {
            return Err(ToolError::Configuration(format!(
                "step '{}' has an empty argument vector",
                step.name
            )));
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: step.working_dir.clone(),
            env: step.env.clone(),
            inputs: step.inputs.iter().map(|f| f.as_path().to_path_buf()).collect(),
            outputs: step.outputs.iter().map(|f| f.as_path().to_path_buf()).collect(),
        })
    }
}

/// Captured result of an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl InvocationOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stderr, or stdout when the tool wrote nothing to stderr.
    pub fn diagnostics(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            self.stderr.clone()
        }
    }
}

fn base_invocation(settings: &TransplanSettings, args: Vec<String>) -> Invocation {
    let tool = &settings.tool;
    Invocation {
        program: tool.program.clone(),
        args: tool.leading_args.iter().cloned().chain(args).collect(),
        working_dir: tool.working_dir.clone(),
        env: tool.env.clone(),
        inputs: Vec::new(),
        outputs: Vec::new(),
    }
}

fn push_opt(args: &mut Vec<String>, flag: &str, value: Option<&str>) {
    if let Some(value) = value {
        args.push(flag.to_string());
        args.push(value.to_string());
    }
}

fn push_each(args: &mut Vec<String>, flag: &str, values: &[String]) {
    for value in values {
        args.push(flag.to_string());
        args.push(value.clone());
    }
}

/// Analysis-only call that writes the plan artifact.
///
/// With a source root the tool discovers files itself and emits relative
/// paths; without one every source is passed explicitly.
pub fn plan_invocation(
    settings: &TransplanSettings,
    sources: &[FileId],
    plan_file: &Utf8Path,
    callgraph: Option<&Utf8Path>,
) -> Invocation {
    let opts = &settings.transform;
    let mut args = vec![
        "plan".to_string(),
        "--mode".to_string(),
        opts.mode.clone(),
        "--frontend".to_string(),
        opts.frontend.as_str().to_string(),
    ];
    push_opt(&mut args, "--config", opts.config.as_ref().map(|c| c.as_str()));

    match &settings.target.source_root {
        Some(root) => push_opt(&mut args, "--root", Some(root.as_str())),
        None => {
            for source in sources {
                push_opt(&mut args, "--source", Some(source.as_str()));
            }
        }
    }

    push_opt(&mut args, "--plan-file", Some(plan_file.as_str()));
    push_opt(&mut args, "--callgraph", callgraph.map(|c| c.as_str()));

    let mut invocation = base_invocation(settings, args);
    invocation.inputs = sources.iter().map(|s| s.as_path().to_path_buf()).collect();
    invocation.outputs = std::iter::once(plan_file.to_path_buf())
        .chain(callgraph.map(Utf8Path::to_path_buf))
        .collect();
    invocation
}

/// Rewrite call covering every planned file; each `transform` entry is an
/// input and each `append` entry a declared output.
pub fn transform_invocation(
    settings: &TransplanSettings,
    plan: &TransformPlan,
    out_path: &Utf8Path,
) -> Invocation {
    let opts = &settings.transform;
    let mut args = vec![
        opts.command.as_str().to_string(),
        "--mode".to_string(),
        opts.mode.clone(),
    ];
    push_opt(&mut args, "--directive", opts.directive.as_deref());
    push_opt(&mut args, "--frontend", Some(opts.frontend.as_str()));
    push_opt(&mut args, "--config", opts.config.as_ref().map(|c| c.as_str()));
    push_opt(&mut args, "--out-path", Some(out_path.as_str()));

    let toggles = [
        (opts.cpp, "--cpp"),
        (opts.inline_members, "--inline-members"),
        (opts.resolve_sequence_association, "--resolve-sequence-association"),
        (opts.derive_argument_array_shape, "--derive-argument-array-shape"),
        (opts.trim_vector_sections, "--trim-vector-sections"),
        (opts.global_var_offload, "--global-var-offload"),
        (opts.blockview_to_fieldview, "--blockview-to-fieldview"),
        (opts.data_offload, "--data-offload"),
        (opts.remove_openmp, "--remove-openmp"),
        (opts.assume_deviceptr, "--assume-deviceptr"),
        (opts.remove_derived_args, "--remove-derived-args"),
    ];
    args.extend(
        toggles
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| flag.to_string()),
    );

    push_each(&mut args, "--header", &opts.headers);
    push_each(&mut args, "--include", &opts.includes);
    push_each(&mut args, "--define", &opts.defines);
    push_each(&mut args, "--xmod", &opts.xmods);

    for source in plan.transform() {
        push_opt(&mut args, "--source", Some(source.as_str()));
    }

    let mut invocation = base_invocation(settings, args);
    invocation.inputs = plan
        .transform()
        .iter()
        .map(|f| f.as_path().to_path_buf())
        .collect();
    invocation.outputs = plan
        .append()
        .iter()
        .map(|f| f.as_path().to_path_buf())
        .collect();
    invocation
}
