use crate::file::FileId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three correlated lists produced by a plan-phase invocation.
///
/// Index `i` of `transform` and index `i` of `append` are the pre- and
/// post-transformation versions of one compilation unit. The constructor
/// enforces equal lengths; the plan cannot be mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformPlan {
    transform: Vec<FileId>,
    append: Vec<FileId>,
    remove: Vec<String>,
}

impl TransformPlan {
    pub fn new(
        transform: Vec<FileId>,
        append: Vec<FileId>,
        remove: Vec<String>,
    ) -> Result<Self, PlanShapeError> {
        if transform.len() != append.len() {
            return Err(PlanShapeError::LengthMismatch {
                transform: transform.len(),
                append: append.len(),
            });
        }
        Ok(Self {
            transform,
            append,
            remove,
        })
    }

    /// A plan that changes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn transform(&self) -> &[FileId] {
        &self.transform
    }

    pub fn append(&self) -> &[FileId] {
        &self.append
    }

    pub fn remove(&self) -> &[String] {
        &self.remove
    }

    /// (original, replacement) pairs in plan order.
    pub fn pairs(&self) -> impl Iterator<Item = (&FileId, &FileId)> {
        self.transform.iter().zip(self.append.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.transform.is_empty() && self.append.is_empty() && self.remove.is_empty()
    }
}

impl<'de> Deserialize<'de> for TransformPlan {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            transform: Vec<FileId>,
            append: Vec<FileId>,
            remove: Vec<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        TransformPlan::new(raw.transform, raw.append, raw.remove).map_err(serde::de::Error::custom)
    }
}

/// Structural violations of the plan invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanShapeError {
    LengthMismatch { transform: usize, append: usize },
}

impl fmt::Display for PlanShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanShapeError::LengthMismatch { transform, append } => write!(
                f,
                "transform list has {} entries but append list has {}",
                transform, append
            ),
        }
    }
}

impl std::error::Error for PlanShapeError {}
