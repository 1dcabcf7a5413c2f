//! Configuration file loading for transplan.
//!
//! Discovers and loads `transplan.toml` from the project directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use transplan_core::commands::{CommandKind, Frontend};
use transplan_core::settings::{TargetSettings, ToolSettings, TransformOptions, TransplanSettings};
use transplan_core::{CollisionPolicy, RemovalMatch};
use transplan_types::file::FileId;
use transplan_types::target::PlacementMode;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "transplan.toml";

/// Top-level configuration from transplan.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransplanConfig {
    /// How the transformation tool is launched.
    pub tool: ToolConfig,

    /// Options for both phases.
    pub transform: TransformConfig,

    /// Where retained and generated files end up.
    pub placement: PlacementConfig,

    /// Plan-phase inputs and artifact locations.
    pub plan: PlanConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub program: Option<String>,

    /// Arguments placed before the subcommand.
    pub args: Vec<String>,

    pub env: BTreeMap<String, String>,

    pub working_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    pub command: Option<CommandKind>,
    pub mode: Option<String>,
    pub directive: Option<String>,
    pub frontend: Option<Frontend>,
    pub config: Option<Utf8PathBuf>,

    pub cpp: bool,
    pub inline_members: bool,
    pub resolve_sequence_association: bool,
    pub derive_argument_array_shape: bool,
    pub trim_vector_sections: bool,
    pub global_var_offload: bool,
    pub blockview_to_fieldview: bool,
    pub data_offload: bool,
    pub remove_openmp: bool,
    pub assume_deviceptr: bool,
    pub remove_derived_args: bool,

    pub headers: Vec<String>,
    pub includes: Vec<String>,
    pub defines: Vec<String>,
    pub xmods: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacementConfig {
    pub mode: Option<PlacementMode>,
    pub output_dir: Option<Utf8PathBuf>,
    pub collision: Option<CollisionPolicy>,
    pub removal_match: Option<RemovalMatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanConfig {
    pub build_dir: Option<Utf8PathBuf>,
    pub source_root: Option<Utf8PathBuf>,

    /// Explicit plan-phase sources.
    pub sources: Vec<String>,

    pub plan_file: Option<Utf8PathBuf>,
    pub callgraph: bool,
}

/// Discover the transplan.toml config file.
///
/// Returns `None` if no config file is found.
pub fn discover_config(project_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a transplan.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<TransplanConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<TransplanConfig> {
    let config: TransplanConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load the explicit config file, or discover one in `project_dir`, or
/// fall back to defaults.
pub fn load_or_default(
    project_dir: &Utf8Path,
    explicit: Option<&Utf8Path>,
) -> anyhow::Result<TransplanConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match discover_config(project_dir) {
        Some(path) => load_config(&path),
        None => Ok(TransplanConfig::default()),
    }
}

/// CLI-side values that override or extend the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub program: Option<String>,
    pub tool_args: Vec<String>,

    pub command: Option<CommandKind>,
    pub mode: Option<String>,
    pub directive: Option<String>,
    pub frontend: Option<Frontend>,
    pub tool_config: Option<Utf8PathBuf>,
    pub toggles: Vec<String>,
    pub headers: Vec<String>,
    pub includes: Vec<String>,
    pub defines: Vec<String>,
    pub xmods: Vec<String>,

    pub placement: Option<PlacementMode>,
    pub output_dir: Option<Utf8PathBuf>,
    pub collision: Option<CollisionPolicy>,
    pub removal_match: Option<RemovalMatch>,

    pub build_dir: Option<Utf8PathBuf>,
    pub source_root: Option<Utf8PathBuf>,
    pub sources: Vec<String>,
    pub plan_file: Option<Utf8PathBuf>,
    pub callgraph: bool,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: TransplanConfig,
}

impl ConfigMerger {
    /// Create a new merger from a loaded config.
    pub fn new(config: TransplanConfig) -> Self {
        Self { config }
    }

    /// Scalar CLI values replace config values; CLI lists extend config
    /// lists without repeating entries; CLI toggles can only switch on.
    /// Tool arguments are positional and are appended as given.
    pub fn merge(self, cli: CliOverrides) -> anyhow::Result<TransplanSettings> {
        let TransplanConfig {
            tool,
            transform,
            placement,
            plan,
        } = self.config;

        let defaults = ToolSettings::default();
        let tool = ToolSettings {
            program: cli.program.or(tool.program).unwrap_or(defaults.program),
            leading_args: tool.args.into_iter().chain(cli.tool_args).collect(),
            env: tool.env,
            working_dir: tool.working_dir,
        };

        let mut opts = TransformOptions {
            command: cli.command.or(transform.command).unwrap_or_default(),
            mode: cli.mode.or(transform.mode).unwrap_or_default(),
            directive: cli.directive.or(transform.directive),
            frontend: cli.frontend.or(transform.frontend).unwrap_or_default(),
            config: cli.tool_config.or(transform.config),
            cpp: transform.cpp,
            inline_members: transform.inline_members,
            resolve_sequence_association: transform.resolve_sequence_association,
            derive_argument_array_shape: transform.derive_argument_array_shape,
            trim_vector_sections: transform.trim_vector_sections,
            global_var_offload: transform.global_var_offload,
            blockview_to_fieldview: transform.blockview_to_fieldview,
            data_offload: transform.data_offload,
            remove_openmp: transform.remove_openmp,
            assume_deviceptr: transform.assume_deviceptr,
            remove_derived_args: transform.remove_derived_args,
            headers: extend_unique(transform.headers, &cli.headers),
            includes: extend_unique(transform.includes, &cli.includes),
            defines: extend_unique(transform.defines, &cli.defines),
            xmods: extend_unique(transform.xmods, &cli.xmods),
        };
        for toggle in &cli.toggles {
            enable_toggle(&mut opts, toggle)?;
        }

        let target_defaults = TargetSettings::default();
        let sources: Vec<FileId> = extend_unique(plan.sources, &cli.sources)
            .into_iter()
            .map(FileId::from)
            .collect();
        let target = TargetSettings {
            build_dir: cli
                .build_dir
                .or(plan.build_dir)
                .unwrap_or(target_defaults.build_dir),
            output_dir: cli.output_dir.or(placement.output_dir),
            source_root: cli.source_root.or(plan.source_root),
            plan_sources: sources,
            placement: cli.placement.or(placement.mode).unwrap_or_default(),
            removal_match: cli
                .removal_match
                .or(placement.removal_match)
                .unwrap_or_default(),
            collision: cli.collision.or(placement.collision).unwrap_or_default(),
            plan_file: cli.plan_file.or(plan.plan_file),
            emit_callgraph: cli.callgraph || plan.callgraph,
            callgraph_file: None,
        };

        Ok(TransplanSettings {
            tool,
            transform: opts,
            target,
        })
    }
}

fn extend_unique(mut base: Vec<String>, extra: &[String]) -> Vec<String> {
    for item in extra {
        if !base.contains(item) {
            base.push(item.clone());
        }
    }
    base
}

/// Switch on a transform toggle by its flag name (without leading dashes).
pub fn enable_toggle(opts: &mut TransformOptions, name: &str) -> anyhow::Result<()> {
    let slot = match name.trim_start_matches("--") {
        "cpp" => &mut opts.cpp,
        "inline-members" => &mut opts.inline_members,
        "resolve-sequence-association" => &mut opts.resolve_sequence_association,
        "derive-argument-array-shape" => &mut opts.derive_argument_array_shape,
        "trim-vector-sections" => &mut opts.trim_vector_sections,
        "global-var-offload" => &mut opts.global_var_offload,
        "blockview-to-fieldview" => &mut opts.blockview_to_fieldview,
        "data-offload" => &mut opts.data_offload,
        "remove-openmp" => &mut opts.remove_openmp,
        "assume-deviceptr" => &mut opts.assume_deviceptr,
        "remove-derived-args" => &mut opts.remove_derived_args,
        other => anyhow::bail!("unknown transform toggle '{}'", other),
    };
    *slot = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_example_config() {
        let contents = r#"
[tool]
program = "python3"
args = ["/opt/loki/scripts/loki-transform.py"]
env = { PYTHONPATH = "/opt/loki" }

[transform]
command = "convert"
mode = "scc"
directive = "openacc"
frontend = "omni"
config = "loki.config"
cpp = true
defines = ["NPROMA=32"]
xmods = ["/opt/xmods"]

[placement]
mode = "copy_unmodified"
output_dir = "build/phys"
collision = "preserve_subpath"
removal_match = "exact"

[plan]
build_dir = "build"
source_root = "src"
callgraph = true
"#;

        let config = parse_config(contents).unwrap();
        assert_eq!(config.tool.program.as_deref(), Some("python3"));
        assert_eq!(config.tool.env["PYTHONPATH"], "/opt/loki");
        assert_eq!(config.transform.frontend, Some(Frontend::Omni));
        assert!(config.transform.cpp);
        assert_eq!(config.placement.mode, Some(PlacementMode::CopyUnmodified));
        assert_eq!(
            config.placement.collision,
            Some(CollisionPolicy::PreserveSubpath)
        );
        assert_eq!(config.placement.removal_match, Some(RemovalMatch::Exact));
        assert!(config.plan.callgraph);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert!(config.tool.program.is_none());
        assert!(config.transform.defines.is_empty());
        assert!(config.placement.mode.is_none());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = parse_config("[transform]\nmodee = \"scc\"\n").unwrap_err();
        assert!(format!("{:#}", err).contains("modee"));
    }

    #[test]
    fn test_merge_cli_scalars_override() {
        let config = parse_config(
            r#"
[transform]
mode = "idem"
frontend = "ofp"

[placement]
mode = "in_place"
"#,
        )
        .unwrap();

        let settings = ConfigMerger::new(config)
            .merge(CliOverrides {
                mode: Some("scc".to_string()),
                placement: Some(PlacementMode::CopyUnmodified),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(settings.transform.mode, "scc");
        assert_eq!(settings.transform.frontend, Frontend::Ofp);
        assert_eq!(settings.target.placement, PlacementMode::CopyUnmodified);
    }

    #[test]
    fn test_merge_cli_lists_extend() {
        let config = parse_config("[transform]\ndefines = [\"A\", \"B\"]\n").unwrap();

        let settings = ConfigMerger::new(config)
            .merge(CliOverrides {
                defines: vec!["B".to_string(), "C".to_string()],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(settings.transform.defines, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_merge_tool_args_keep_repeats() {
        let config = parse_config("[tool]\nargs = [\"-W\", \"ignore\"]\n").unwrap();

        let settings = ConfigMerger::new(config)
            .merge(CliOverrides {
                tool_args: vec![
                    "-W".to_string(),
                    "error::DeprecationWarning".to_string(),
                    "loki-transform.py".to_string(),
                ],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(
            settings.tool.leading_args,
            vec![
                "-W",
                "ignore",
                "-W",
                "error::DeprecationWarning",
                "loki-transform.py"
            ]
        );
    }

    #[test]
    fn test_merge_toggles_switch_on() {
        let settings = ConfigMerger::new(TransplanConfig::default())
            .merge(CliOverrides {
                toggles: vec!["inline-members".to_string(), "--cpp".to_string()],
                ..Default::default()
            })
            .unwrap();

        assert!(settings.transform.inline_members);
        assert!(settings.transform.cpp);
        assert!(!settings.transform.remove_openmp);
    }

    #[test]
    fn test_merge_unknown_toggle_fails() {
        let err = ConfigMerger::new(TransplanConfig::default())
            .merge(CliOverrides {
                toggles: vec!["turbo".to_string()],
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("turbo"));
    }

    #[test]
    fn test_merge_defaults() {
        let settings = ConfigMerger::new(TransplanConfig::default())
            .merge(CliOverrides::default())
            .unwrap();

        assert_eq!(settings.tool.program, "loki-transform.py");
        assert_eq!(settings.target.build_dir, Utf8PathBuf::from("build"));
        assert_eq!(settings.target.placement, PlacementMode::InPlace);
        assert_eq!(settings.target.collision, CollisionPolicy::Fail);
        assert!(!settings.target.emit_callgraph);
    }

    #[test]
    fn test_load_or_default_discovers_file() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), "[transform]\nmode = \"scc\"\n").unwrap();

        let config = load_or_default(&dir, None).unwrap();
        assert_eq!(config.transform.mode.as_deref(), Some("scc"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();

        let config = load_or_default(&dir, None).unwrap();
        assert!(config.transform.mode.is_none());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();

        let err = load_or_default(&dir, Some(&dir.join("custom.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("custom.toml"));
    }
}
