//! Clap-free settings for the plan and transform phases.

use crate::commands::{CommandKind, Frontend};
use crate::error::ToolError;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use transplan_domain::{CollisionPolicy, RemovalMatch};
use transplan_types::file::FileId;
use transplan_types::target::PlacementMode;

/// How to launch the transformation tool.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub program: String,
    /// Arguments placed before the subcommand, e.g. a script path when
    /// `program` is an interpreter.
    pub leading_args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<Utf8PathBuf>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            program: "loki-transform.py".to_string(),
            leading_args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }
}

/// Options shared by both phases plus the transform-only toggles.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    pub command: CommandKind,
    pub mode: String,
    pub directive: Option<String>,
    pub frontend: Frontend,
    pub config: Option<Utf8PathBuf>,

    // Toggles
    pub cpp: bool,
    pub inline_members: bool,
    pub resolve_sequence_association: bool,
    pub derive_argument_array_shape: bool,
    pub trim_vector_sections: bool,
    pub global_var_offload: bool,
    pub blockview_to_fieldview: bool,

    // Legacy toggles
    pub data_offload: bool,
    pub remove_openmp: bool,
    pub assume_deviceptr: bool,
    pub remove_derived_args: bool,

    // Pass-through lists, one flag per value
    pub headers: Vec<String>,
    pub includes: Vec<String>,
    pub defines: Vec<String>,
    pub xmods: Vec<String>,
}

/// Per-target placement and artifact locations.
#[derive(Debug, Clone)]
pub struct TargetSettings {
    pub build_dir: Utf8PathBuf,
    /// Where rewritten and copied files go; `build_dir` when unset.
    pub output_dir: Option<Utf8PathBuf>,
    /// Passed to the plan phase as `--root` and used to resolve relative ids.
    pub source_root: Option<Utf8PathBuf>,
    /// Explicit plan-phase sources; the target's own sources when empty.
    pub plan_sources: Vec<FileId>,
    pub placement: PlacementMode,
    pub removal_match: RemovalMatch,
    pub collision: CollisionPolicy,
    pub plan_file: Option<Utf8PathBuf>,
    pub emit_callgraph: bool,
    pub callgraph_file: Option<Utf8PathBuf>,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            build_dir: Utf8PathBuf::from("build"),
            output_dir: None,
            source_root: None,
            plan_sources: Vec::new(),
            placement: PlacementMode::default(),
            removal_match: RemovalMatch::default(),
            collision: CollisionPolicy::default(),
            plan_file: None,
            emit_callgraph: false,
            callgraph_file: None,
        }
    }
}

impl TargetSettings {
    pub fn output_dir(&self) -> &Utf8Path {
        self.output_dir.as_deref().unwrap_or(&self.build_dir)
    }

    /// `<build_dir>/<target>.plan.json` unless overridden.
    pub fn plan_file_for(&self, target: &str) -> Utf8PathBuf {
        self.plan_file
            .clone()
            .unwrap_or_else(|| self.build_dir.join(format!("{}.plan.json", target)))
    }

    /// `<build_dir>/<target>.callgraph` when call-graph output is enabled.
    pub fn callgraph_file_for(&self, target: &str) -> Option<Utf8PathBuf> {
        if !self.emit_callgraph && self.callgraph_file.is_none() {
            return None;
        }
        Some(
            self.callgraph_file
                .clone()
                .unwrap_or_else(|| self.build_dir.join(format!("{}.callgraph", target))),
        )
    }
}

/// Everything one target run needs.
#[derive(Debug, Clone, Default)]
pub struct TransplanSettings {
    pub tool: ToolSettings,
    pub transform: TransformOptions,
    pub target: TargetSettings,
}

impl TransplanSettings {
    /// Check required parameters before anything is invoked.
    pub fn validate(&self, target_name: &str) -> Result<(), ToolError> {
        validate_target_name(target_name)?;
        if self.tool.program.trim().is_empty() {
            return Err(ToolError::Configuration(
                "tool program must not be empty".to_string(),
            ));
        }
        if self.transform.mode.trim().is_empty() {
            return Err(ToolError::Configuration(
                "transformation mode is required".to_string(),
            ));
        }
        if self.target.build_dir.as_str().is_empty() {
            return Err(ToolError::Configuration(
                "build directory is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Target names key intermediate artifact paths, so they must be a single
/// path component.
pub fn validate_target_name(name: &str) -> Result<(), ToolError> {
    if name.trim().is_empty() {
        return Err(ToolError::Configuration(
            "target name is required".to_string(),
        ));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ToolError::Configuration(format!(
            "target name '{}' must not contain path separators",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TransplanSettings {
        TransplanSettings {
            transform: TransformOptions {
                mode: "scc".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn artifact_paths_are_keyed_by_target() {
        let target = TargetSettings {
            build_dir: Utf8PathBuf::from("/b"),
            emit_callgraph: true,
            ..Default::default()
        };
        assert_eq!(target.plan_file_for("phys"), Utf8PathBuf::from("/b/phys.plan.json"));
        assert_eq!(
            target.callgraph_file_for("phys"),
            Some(Utf8PathBuf::from("/b/phys.callgraph"))
        );
        assert_eq!(target.output_dir(), Utf8Path::new("/b"));
    }

    #[test]
    fn callgraph_is_off_by_default() {
        assert_eq!(TargetSettings::default().callgraph_file_for("t"), None);
    }

    #[test]
    fn missing_mode_is_configuration_error() {
        let mut s = settings();
        s.transform.mode.clear();
        let err = s.validate("phys").expect_err("no mode");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn target_name_with_separator_is_rejected() {
        let err = settings().validate("a/b").expect_err("separator");
        assert!(err.to_string().contains("path separators"));
        assert!(settings().validate("phys").is_ok());
    }
}
