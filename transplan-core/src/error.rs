use camino::Utf8PathBuf;
use std::fmt;

/// External invocation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Plan,
    Transform,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Plan => f.write_str("plan"),
            Phase::Transform => f.write_str("transform"),
        }
    }
}

/// Error type for pipeline results. Exit code 2 = configuration error, 1 = everything else.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{phase} phase failed ({}):\n{diagnostics}", exit_status(.exit_code))]
    ExternalTool {
        phase: Phase,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("malformed plan {path}: {message}")]
    MalformedPlan { path: Utf8PathBuf, message: String },

    #[error("file operation failed on {path}: {message}")]
    FileOperation { path: Utf8PathBuf, message: String },

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ToolError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ToolError::Configuration(_) => 2,
            _ => 1,
        }
    }
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated without exit code".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_exit_with_two() {
        assert_eq!(ToolError::Configuration("x".into()).exit_code(), 2);
        let err = ToolError::FileOperation {
            path: "a.f".into(),
            message: "gone".into(),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn external_tool_keeps_diagnostics_verbatim() {
        let err = ToolError::ExternalTool {
            phase: Phase::Plan,
            exit_code: Some(3),
            diagnostics: "line 1\n  line 2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "plan phase failed (exit code 3):\nline 1\n  line 2"
        );
    }
}
