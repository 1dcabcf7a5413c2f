//! Default process- and filesystem-backed port implementations.

use crate::commands::{Invocation, InvocationOutput};
use crate::ports::{CommandInvoker, FilePort};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, info};

/// Runs invocations as child processes and captures their output.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker;

impl CommandInvoker for ProcessInvoker {
    fn invoke(&self, invocation: &Invocation) -> anyhow::Result<InvocationOutput> {
        info!(program = %invocation.program, args = ?invocation.args, "running external tool");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).envs(&invocation.env);
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .with_context(|| format!("spawn {}", invocation.program))?;
        let result = InvocationOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(exit_code = ?result.exit_code, "external tool finished");
        Ok(result)
    }
}

/// Filesystem operations via `fs-err`.
#[derive(Debug, Clone, Default)]
pub struct FsFilePort;

impl FilePort for FsFilePort {
    fn read_file(&self, path: &Utf8Path) -> anyhow::Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("read {}", path))
    }

    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn copy_file(&self, from: &Utf8Path, to: &Utf8Path) -> anyhow::Result<()> {
        if let Some(parent) = to.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| format!("create parent dir for {}", to))?;
        }
        debug!(from = %from, to = %to, "copy");
        fs::copy(from, to)
            .map(|_| ())
            .with_context(|| format!("copy {} to {}", from, to))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }
}

/// Invoker for embedding and testing that launches nothing.
///
/// Every call is recorded. Canned artifacts registered with
/// [`RecordingInvoker::with_artifact`] are written to disk when a call
/// declares them as outputs, which stands in for a real plan phase.
#[derive(Debug, Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<Invocation>>,
    artifacts: BTreeMap<Utf8PathBuf, Vec<u8>>,
    failure: Option<InvocationOutput>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(mut self, path: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.artifacts.insert(path.into(), contents.into());
        self
    }

    /// Make every call exit with `exit_code` and `stderr`.
    pub fn failing(mut self, exit_code: i32, stderr: impl Into<String>) -> Self {
        self.failure = Some(InvocationOutput {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        });
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CommandInvoker for RecordingInvoker {
    fn invoke(&self, invocation: &Invocation) -> anyhow::Result<InvocationOutput> {
        self.calls
            .lock()
            .map_err(|_| anyhow::anyhow!("recording invoker lock poisoned"))?
            .push(invocation.clone());

        if let Some(failure) = &self.failure {
            return Ok(failure.clone());
        }

        for output in &invocation.outputs {
            if let Some(contents) = self.artifacts.get(output) {
                FsFilePort.write_file(output, contents)?;
            }
        }
        Ok(InvocationOutput::success())
    }
}
