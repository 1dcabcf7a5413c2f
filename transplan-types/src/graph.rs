use crate::file::FileId;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of deferred work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Transform-phase rewrite of planned sources.
    Transform,
    /// Duplicate of one retained source into the output directory. The
    /// single input is copied to the single output; `argv` is empty.
    Copy,
}

/// A declared, not yet executed, build step.
///
/// `inputs` must exist (or be produced by earlier steps) before the step
/// runs; `outputs` are the files the step promises to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub name: String,
    pub kind: StepKind,

    /// Full argument vector, program first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub argv: Vec<String>,

    #[serde(default)]
    pub inputs: Vec<FileId>,

    #[serde(default)]
    pub outputs: Vec<FileId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<Utf8PathBuf>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Ordered collection of declared build steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildGraph {
    pub schema: String,

    #[serde(default)]
    pub steps: Vec<BuildStep>,
}

impl Default for BuildGraph {
    fn default() -> Self {
        Self {
            schema: crate::schema::TRANSPLAN_STEPS_V1.to_string(),
            steps: Vec::new(),
        }
    }
}

impl BuildGraph {
    pub fn push(&mut self, step: BuildStep) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps_of(&self, kind: StepKind) -> impl Iterator<Item = &BuildStep> {
        self.steps.iter().filter(move |s| s.kind == kind)
    }

    /// Step that declares `output`, if any.
    pub fn producer_of(&self, output: &FileId) -> Option<&BuildStep> {
        self.steps.iter().find(|s| s.outputs.contains(output))
    }
}
