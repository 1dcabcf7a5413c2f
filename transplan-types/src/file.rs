use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a source file: a relative or absolute path.
///
/// Ids are compared literally. Use [`FileId::resolve`] to compare ids produced
/// relative to different bases (e.g. a plan generated without a source root
/// lists absolute paths while target manifests usually list relative ones).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Utf8PathBuf);

impl FileId {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Utf8Path {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_absolute(&self) -> bool {
        self.0.is_absolute()
    }

    /// Final path component, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    /// Join a relative id onto `base` and drop `.` components.
    /// Absolute ids are only normalized.
    pub fn resolve(&self, base: Option<&Utf8Path>) -> FileId {
        let joined = match base {
            Some(base) if self.0.is_relative() => base.join(&self.0),
            _ => self.0.clone(),
        };
        FileId(normalize(&joined))
    }

    /// Path relative to `root` when the id lives under it, otherwise the id's
    /// own normal components (root, prefix and `..` stripped).
    pub fn relative_to(&self, root: Option<&Utf8Path>) -> Utf8PathBuf {
        let resolved = self.resolve(root);
        if let Some(root) = root
            && let Ok(rel) = resolved.0.strip_prefix(normalize(root))
        {
            return rel.to_path_buf();
        }
        resolved
            .0
            .components()
            .filter(|c| matches!(c, Utf8Component::Normal(_)))
            .collect()
    }
}

fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    path.components()
        .filter(|c| !matches!(c, Utf8Component::CurDir))
        .collect()
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Utf8PathBuf> for FileId {
    fn from(value: Utf8PathBuf) -> Self {
        Self(value)
    }
}

impl AsRef<Utf8Path> for FileId {
    fn as_ref(&self) -> &Utf8Path {
        &self.0
    }
}

/// Ordered list of the files a build target compiles.
///
/// Order is kept as given. Duplicates are tolerated on input, and
/// [`SourceSet::push_unique`] never introduces new ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceSet(Vec<FileId>);

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileId> {
        self.0.iter()
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.0.contains(id)
    }

    /// Append `id` unless it is already present. Returns whether it was added.
    pub fn push_unique(&mut self, id: FileId) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn as_slice(&self) -> &[FileId] {
        &self.0
    }
}

impl FromIterator<FileId> for SourceSet {
    fn from_iter<I: IntoIterator<Item = FileId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<FileId>> for SourceSet {
    fn from(value: Vec<FileId>) -> Self {
        Self(value)
    }
}

impl IntoIterator for SourceSet {
    type Item = FileId;
    type IntoIter = std::vec::IntoIter<FileId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SourceSet {
    type Item = &'a FileId;
    type IntoIter = std::slice::Iter<'a, FileId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
