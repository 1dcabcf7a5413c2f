pub mod plan_v1;

pub use plan_v1::PlanV1;

/// Errors emitted while converting wire models to internal models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    MissingCollection { name: &'static str },
    EmptyEntry { collection: &'static str, index: usize },
    Shape(crate::plan::PlanShapeError),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::MissingCollection { name } => {
                write!(f, "missing '{}' collection", name)
            }
            WireError::EmptyEntry { collection, index } => {
                write!(f, "empty entry at {}[{}]", collection, index)
            }
            WireError::Shape(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for WireError {}
