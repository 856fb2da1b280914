//! Translation failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    /// The target dialect cannot express what the tree asks for
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The tree violates an invariant the passes rely on; no text may be produced
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("Entity not mapped: {0}")]
    UnknownEntity(String),
}

impl TranslateError {
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        TranslateError::Unsupported(msg.into())
    }

    pub(crate) fn inconsistent(msg: impl Into<String>) -> Self {
        TranslateError::InternalConsistency(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;
