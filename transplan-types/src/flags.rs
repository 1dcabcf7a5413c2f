use crate::file::FileId;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-file compiler configuration. Never interpreted, only copied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileFlags {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub definitions: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_dirs: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl CompileFlags {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.include_dirs.is_empty() && self.options.is_empty()
    }
}

/// Compiler configuration keyed by file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompileFlagSet(BTreeMap<FileId, CompileFlags>);

impl CompileFlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &FileId) -> Option<&CompileFlags> {
        self.0.get(id)
    }

    /// Look up `id` literally, then by resolved path against `base`.
    pub fn find(&self, id: &FileId, base: Option<&Utf8Path>) -> Option<&CompileFlags> {
        if let Some(flags) = self.0.get(id) {
            return Some(flags);
        }
        let wanted = id.resolve(base);
        self.0
            .iter()
            .find(|(key, _)| key.resolve(base) == wanted)
            .map(|(_, flags)| flags)
    }

    pub fn insert(&mut self, id: FileId, flags: CompileFlags) -> Option<CompileFlags> {
        self.0.insert(id, flags)
    }

    pub fn remove(&mut self, id: &FileId) -> Option<CompileFlags> {
        self.0.remove(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FileId, &CompileFlags)> {
        self.0.iter()
    }
}

impl FromIterator<(FileId, CompileFlags)> for CompileFlagSet {
    fn from_iter<I: IntoIterator<Item = (FileId, CompileFlags)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
