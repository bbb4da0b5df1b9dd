//! Error types for Turnpike.

pub mod classify;

pub use classify::{ErrorKind, ErrorPolicy, ErrorRecord};

use thiserror::Error;

use crate::backend::BackendError;

/// Primary error type for all Turnpike operations.
#[derive(Error, Debug)]
pub enum TurnpikeError {
    /// Raw backend failure that has not passed the classifier yet.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Classified failure re-raised under [`ErrorPolicy::Raise`].
    #[error("{} error: {}", .record.kind, .record.message)]
    Classified { record: ErrorRecord },

    /// The turn's token was signalled. Not a failure.
    #[error("turn canceled")]
    Canceled,

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("quirk stage '{stage}' failed: {message}")]
    Quirk { stage: &'static str, message: String },

    #[error("tool step limit reached ({0} steps)")]
    ToolStepLimit(u32),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TurnpikeError {
    /// The classified record, when one is attached.
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            Self::Classified { record } => Some(record),
            _ => None,
        }
    }

    /// Whether this error represents user-initiated cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TurnpikeError>;
