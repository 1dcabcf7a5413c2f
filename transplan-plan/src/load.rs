use crate::cmake::parse_set_calls;
use camino::Utf8Path;
use fs_err as fs;
use thiserror::Error;
use tracing::debug;
use transplan_types::plan::{PlanShapeError, TransformPlan};
use transplan_types::wire::{PlanV1, WireError};

/// Encoding of a plan artifact on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Cmake,
}

impl PlanFormat {
    /// `.cmake` files are CMake list files, everything else is JSON.
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("cmake") => PlanFormat::Cmake,
            _ => PlanFormat::Json,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanLoadError {
    #[error("io error: {message}")]
    Io { message: String },

    #[error("json parse error: {message}")]
    Json { message: String },

    #[error("cmake parse error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("missing '{name}' collection")]
    MissingCollection { name: &'static str },

    #[error("empty entry at {collection}[{index}]")]
    EmptyEntry {
        collection: &'static str,
        index: usize,
    },

    #[error("transform list has {transform} entries but append list has {append}")]
    LengthMismatch { transform: usize, append: usize },
}

impl From<WireError> for PlanLoadError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::MissingCollection { name } => PlanLoadError::MissingCollection { name },
            WireError::EmptyEntry { collection, index } => {
                PlanLoadError::EmptyEntry { collection, index }
            }
            WireError::Shape(PlanShapeError::LengthMismatch { transform, append }) => {
                PlanLoadError::LengthMismatch { transform, append }
            }
        }
    }
}

/// Read and validate the plan artifact at `path`.
pub fn load_plan(path: &Utf8Path) -> Result<TransformPlan, PlanLoadError> {
    let format = PlanFormat::from_path(path);
    debug!(path = %path, ?format, "loading plan artifact");

    let text = fs::read_to_string(path).map_err(|e| PlanLoadError::Io {
        message: e.to_string(),
    })?;
    parse_plan(&text, format)
}

/// Validate plan text already in memory.
pub fn parse_plan(text: &str, format: PlanFormat) -> Result<TransformPlan, PlanLoadError> {
    let wire = match format {
        PlanFormat::Json => {
            serde_json::from_str::<PlanV1>(text).map_err(|e| PlanLoadError::Json {
                message: e.to_string(),
            })?
        }
        PlanFormat::Cmake => wire_from_cmake(text)?,
    };

    let plan = TransformPlan::try_from(wire)?;
    debug!(
        transform = plan.transform().len(),
        append = plan.append().len(),
        remove = plan.remove().len(),
        "plan imported"
    );
    Ok(plan)
}

fn wire_from_cmake(text: &str) -> Result<PlanV1, PlanLoadError> {
    let mut wire = PlanV1::default();

    for call in parse_set_calls(text)? {
        let name = call.name.to_ascii_uppercase();
        let slot = if name.ends_with("_TO_TRANSFORM") {
            &mut wire.transform
        } else if name.ends_with("_TO_APPEND") {
            &mut wire.append
        } else if name.ends_with("_TO_REMOVE") {
            &mut wire.remove
        } else {
            debug!(variable = %call.name, line = call.line, "ignoring unrelated set()");
            continue;
        };
        // Later assignments win, as they would when CMake includes the file.
        *slot = Some(call.values);
    }

    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            PlanFormat::from_path(Utf8Path::new("build/plan_phys.cmake")),
            PlanFormat::Cmake
        );
        assert_eq!(
            PlanFormat::from_path(Utf8Path::new("build/plan_phys.CMAKE")),
            PlanFormat::Cmake
        );
        assert_eq!(
            PlanFormat::from_path(Utf8Path::new("build/phys.plan.json")),
            PlanFormat::Json
        );
        assert_eq!(
            PlanFormat::from_path(Utf8Path::new("build/plan")),
            PlanFormat::Json
        );
    }

    #[test]
    fn cmake_later_assignment_wins() {
        let text = r#"
set( SRC_TO_TRANSFORM a.F90 )
set( SRC_TO_TRANSFORM b.F90 )
set( SRC_TO_APPEND b.idem.F90 )
set( SRC_TO_REMOVE )
"#;
        let plan = parse_plan(text, PlanFormat::Cmake).expect("parse");
        assert_eq!(plan.transform()[0].as_str(), "b.F90");
        assert!(plan.remove().is_empty());
    }

    #[test]
    fn wire_errors_map_to_load_errors() {
        let err = PlanLoadError::from(WireError::Shape(PlanShapeError::LengthMismatch {
            transform: 3,
            append: 1,
        }));
        assert_eq!(
            err,
            PlanLoadError::LengthMismatch {
                transform: 3,
                append: 1
            }
        );
    }
}
