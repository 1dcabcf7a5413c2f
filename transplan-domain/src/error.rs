use thiserror::Error;
use transplan_types::file::FileId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid removal pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("'{first}' and '{second}' would both end up at {destination}")]
    CopyCollision {
        destination: FileId,
        first: FileId,
        second: FileId,
    },

    #[error("source '{id}' has no file name")]
    InvalidSource { id: FileId },
}
