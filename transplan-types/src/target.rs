use crate::file::{FileId, SourceSet};
use crate::flags::CompileFlagSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where retained, untransformed sources are compiled from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    /// Untouched sources stay at their original location.
    #[default]
    InPlace,
    /// Retained sources are duplicated into the output directory and the
    /// target compiles the copies.
    CopyUnmodified,
}

impl PlacementMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PlacementMode::InPlace => "in_place",
            PlacementMode::CopyUnmodified => "copy_unmodified",
        }
    }
}

/// A build target as seen by the surrounding build system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    pub name: String,

    #[serde(default)]
    pub sources: SourceSet,

    #[serde(default, skip_serializing_if = "CompileFlagSet::is_empty")]
    pub flags: CompileFlagSet,

    /// Files the build must produce rather than expect on disk.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub generated: BTreeSet<FileId>,
}

impl BuildTarget {
    pub fn new(name: impl Into<String>, sources: SourceSet) -> Self {
        Self {
            name: name.into(),
            sources,
            flags: CompileFlagSet::new(),
            generated: BTreeSet::new(),
        }
    }

    pub fn replace_sources(&mut self, sources: SourceSet) {
        self.sources = sources;
    }

    pub fn mark_generated(&mut self, id: FileId) {
        self.generated.insert(id);
    }

    pub fn is_generated(&self, id: &FileId) -> bool {
        self.generated.contains(id)
    }
}
