//! Persistence collaborators for the versioned record store.
//!
//! A backend only has to offer one non-trivial primitive: a conditional
//! update that applies a change if and only if the stored version still
//! equals the caller's expected version, and reports whether it did.
//! In SQL that is `UPDATE ... WHERE id = $1 AND version = $2` plus the
//! affected-row count; in a document store it is a compare-and-set.
//!
//! ## Example
//!
//! ```ignore
//! use versioned_records::{InMemoryBackend, VersionedRecordStore};
//!
//! let backend = InMemoryBackend::new();
//! let fares = VersionedRecordStore::<_, FlightFare>::new(backend.clone());
//! ```

mod in_memory;
mod record_backend;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

pub use in_memory::InMemoryBackend;
pub use record_backend::RecordBackend;

/// A row as the backend stores it: provenance columns plus schemaless payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub version: u64,
    pub payload: Map<String, Value>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// A single conditional write.
///
/// Applied only when the stored version equals `expected_version`. On
/// success the backend merges `fields` into the payload, sets the version to
/// `expected_version + 1` and stamps `updated_by`/`updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalWrite {
    pub expected_version: u64,
    pub fields: Map<String, Value>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl ConditionalWrite {
    /// Apply this write to `record` in place. Callers must have checked the version.
    pub fn apply_to(self, record: &mut StoredRecord) {
        for (key, value) in self.fields {
            record.payload.insert(key, value);
        }
        record.version = self.expected_version + 1;
        record.updated_by = self.updated_by;
        record.updated_at = self.updated_at;
    }
}

/// Error type for backend round trips.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not be reached or dropped the connection.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// No reply arrived in time.
    #[error("backend timed out: {0}")]
    Timeout(String),
    /// An insert collided with an existing id.
    #[error("duplicate id {collection}:{id}")]
    DuplicateId { collection: String, id: String },
    /// A local lock was poisoned by a panicking writer.
    #[error("backend lock poisoned during {0}")]
    Poisoned(&'static str),
    /// Stored data is unreadable.
    #[error("corrupt backend data: {0}")]
    Corrupt(String),
}

impl BackendError {
    /// Transient failures leave the outcome of a write unknown.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::Timeout(_))
    }
}
