use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::backend::BackendError;
use crate::validation::ValidationError;

/// The store operation that was in flight when an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    List,
}

impl Operation {
    /// Whether a failed round trip for this operation may still have been applied.
    pub fn is_write(self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        };
        f.write_str(name)
    }
}

/// Error type for versioned record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id exists.
    #[error("record not found: {collection}:{id}")]
    NotFound { collection: &'static str, id: String },

    /// The record exists but another writer already advanced its version.
    #[error(
        "concurrent update detected on {collection}:{id} (expected version {expected}, current {current_version})"
    )]
    Conflict {
        collection: &'static str,
        id: String,
        expected: u64,
        current_version: u64,
        /// The current payload, so the caller can merge or re-prompt.
        current: Option<Map<String, Value>>,
    },

    /// Input rejected before any write was attempted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The round trip failed. For writes the outcome is unknown: re-read
    /// before deciding whether to resubmit.
    #[error("transient failure during {operation} of {collection}:{id}: {source}")]
    Transient {
        operation: Operation,
        collection: &'static str,
        id: String,
        #[source]
        source: BackendError,
    },

    /// Non-transient backend failure.
    #[error("backend error: {0}")]
    Backend(#[source] BackendError),

    /// Stored payload does not deserialize into the record type.
    #[error("failed to decode {collection}:{id}: {message}")]
    Decode {
        collection: &'static str,
        id: String,
        message: String,
    },
}

impl StoreError {
    pub(crate) fn from_backend(
        err: BackendError,
        operation: Operation,
        collection: &'static str,
        id: impl Into<String>,
    ) -> Self {
        if err.is_transient() {
            StoreError::Transient {
                operation,
                collection,
                id: id.into(),
                source: err,
            }
        } else {
            StoreError::Backend(err)
        }
    }

    /// True when a write may or may not have been applied.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, StoreError::Transient { operation, .. } if operation.is_write())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Current version carried by a conflict.
    pub fn current_version(&self) -> Option<u64> {
        match self {
            StoreError::Conflict {
                current_version, ..
            } => Some(*current_version),
            _ => None,
        }
    }
}
