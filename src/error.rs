//! Typed errors for timeline restructuring.

use thiserror::Error;

/// Reasons a split can be refused or abandoned.
#[derive(Debug, Error)]
pub enum SplitError {
    /// The request was invalid; nothing was written.
    #[error("invalid split: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Every `-split-N` candidate up to the attempt limit was taken.
    #[error("no free burst id derived from {burst_id} after {attempts} attempts")]
    IdExhausted { burst_id: String, attempts: u32 },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SplitError {
    pub fn validation(message: impl Into<String>) -> Self {
        SplitError::Validation(vec![message.into()])
    }

    /// Messages suitable for showing to an operator.
    pub fn messages(&self) -> Vec<String> {
        match self {
            SplitError::Validation(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<rusqlite::Error> for SplitError {
    fn from(e: rusqlite::Error) -> Self {
        SplitError::Storage(e.into())
    }
}

/// Why a merge left the store untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollbackReason {
    #[error("cannot merge a session into itself")]
    SameSession,

    #[error("session {0} not found")]
    SessionNotFound(i64),

    /// Post-move verification found photos still owned by the source.
    #[error("source session still owns {0} photos after move")]
    SourceNotEmpty(i64),

    #[error("merge failed: {0}")]
    Failed(String),
}
