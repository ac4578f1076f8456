//! Audit trail of committed writes.
//!
//! The store appends one [`AuditEntry`] per successful create, update and
//! delete. Entries are emitted after the write has committed; a failing sink
//! is logged and never turns a committed write into an error.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditOperation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub operation: AuditOperation,
    pub collection: &'static str,
    pub record_id: String,
    /// Version after the write; for deletes, the version that was removed (0 if unknown).
    pub version: u64,
    /// Initial payload for creates, applied patch for updates, empty for deletes.
    pub changes: Map<String, Value>,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("audit sink failed: {0}")]
pub struct AuditError(pub String);

/// Destination for audit entries (a log table, a topic, a file).
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Audit sink that keeps entries in memory. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries in append order.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AuditError("audit log lock poisoned".into()))?;
        Ok(entries.clone())
    }

    /// Entries for one record in append order.
    pub fn history(&self, record_id: &str) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| entry.record_id == record_id)
            .collect())
    }
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AuditError("audit log lock poisoned".into()))?;
        entries.push(entry);
        Ok(())
    }
}
