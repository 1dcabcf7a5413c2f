//! Port traits abstracting all I/O away from the pipeline.

use crate::commands::{Invocation, InvocationOutput};
use camino::Utf8Path;

/// Issues one external-process call.
///
/// A non-zero exit is reported through [`InvocationOutput`], not as an
/// error; `Err` means the process could not be run at all.
pub trait CommandInvoker {
    fn invoke(&self, invocation: &Invocation) -> anyhow::Result<InvocationOutput>;
}

/// File-system operations.
pub trait FilePort {
    fn read_file(&self, path: &Utf8Path) -> anyhow::Result<Vec<u8>>;
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn copy_file(&self, from: &Utf8Path, to: &Utf8Path) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}
