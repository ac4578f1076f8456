//! VersionedRecordStore - optimistic concurrency control over a RecordBackend.
//!
//! The store is stateless: it holds no locks, no caches and no in-memory
//! version tracking. Every read goes to the backend, and every update is a
//! single conditional write whose affected-row result is the only thing that
//! decides who won.
//!
//! ## Example
//!
//! ```ignore
//! use versioned_records::{InMemoryBackend, VersionedRecordStore};
//!
//! let fares = VersionedRecordStore::<_, FlightFare>::new(InMemoryBackend::new());
//! let created = fares.create(&fare, "user-1")?;
//!
//! let patch = FlightFarePatch { base_price: Some(120.0), ..Default::default() };
//! match fares.update(&created.id, 1, &patch, "user-1") {
//!     Ok(updated) => assert_eq!(updated.version.get(), 2),
//!     Err(StoreError::Conflict { current_version, .. }) => { /* refresh and re-prompt */ }
//!     Err(e) => return Err(e),
//! }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Map;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditOperation, AuditSink};
use crate::backend::{ConditionalWrite, RecordBackend, StoredRecord};
use crate::error::{Operation, StoreError};
use crate::query::{Page, PageRequest, SortRequest};
use crate::record::{to_fields, Record, Version, VersionedRecord};
use crate::validation::{non_blank, Validate, ValidationError};

/// What a re-read says about a write whose round trip failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<M> {
    /// Still at the expected version: the write did not apply and may be resubmitted.
    NotApplied(VersionedRecord<M>),
    /// The version moved past the expected one. The write may have been ours
    /// or another writer's; `updated_by` tells whose write landed last.
    Advanced(VersionedRecord<M>),
    /// The record no longer exists.
    Missing,
}

/// Typed optimistic-concurrency store for records of type `M`.
pub struct VersionedRecordStore<B, M> {
    backend: B,
    audit: Option<Arc<dyn AuditSink>>,
    _marker: PhantomData<M>,
}

impl<B: Clone, M> Clone for VersionedRecordStore<B, M> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            audit: self.audit.clone(),
            _marker: PhantomData,
        }
    }
}

impl<B: RecordBackend, M: Record> VersionedRecordStore<B, M> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            audit: None,
            _marker: PhantomData,
        }
    }

    /// Emit an audit entry for every committed write.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn collection(&self) -> &'static str {
        M::COLLECTION
    }

    /// Read the current record, including its version.
    pub fn read(&self, id: &str) -> Result<VersionedRecord<M>, StoreError> {
        non_blank(id, "id")?;
        match self.fetch(id, Operation::Read)? {
            Some(stored) => VersionedRecord::decode(stored),
            None => Err(self.not_found(id)),
        }
    }

    /// Create a new record at version 1 under a fresh id.
    pub fn create(&self, payload: &M, actor: &str) -> Result<VersionedRecord<M>, StoreError> {
        non_blank(actor, "actor")?;
        let fields = to_fields(payload, "payload")?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let stored = StoredRecord {
            id: id.clone(),
            version: Version::INITIAL.get(),
            payload: fields.clone(),
            created_by: actor.to_string(),
            created_at: now,
            updated_by: actor.to_string(),
            updated_at: now,
        };

        self.backend
            .insert(M::COLLECTION, stored)
            .map_err(|e| self.backend_failure(e, Operation::Create, &id))?;

        debug!(collection = M::COLLECTION, %id, %actor, "record created");
        self.audit(AuditOperation::Create, &id, 1, fields, actor, now);

        Ok(VersionedRecord {
            id,
            version: Version::INITIAL,
            payload: payload.clone(),
            created_by: actor.to_string(),
            created_at: now,
            updated_by: actor.to_string(),
            updated_at: now,
        })
    }

    /// Apply `patch` if and only if the record is still at `expected_version`.
    ///
    /// The version check and the write are one conditional write in the
    /// backend. When nothing matched, a follow-up read tells `NotFound` apart
    /// from `Conflict`. Conflicts are reported, never retried here.
    pub fn update(
        &self,
        id: &str,
        expected_version: i64,
        patch: &M::Patch,
        actor: &str,
    ) -> Result<VersionedRecord<M>, StoreError> {
        let (expected, fields) = self.validate_update(id, expected_version, patch, actor)?;

        let now = Utc::now();
        let write = ConditionalWrite {
            expected_version: expected.get(),
            fields: fields.clone(),
            updated_by: actor.to_string(),
            updated_at: now,
        };

        let applied = self
            .backend
            .update_if_version(M::COLLECTION, id, write)
            .map_err(|e| self.backend_failure(e, Operation::Update, id))?;

        match applied {
            Some(stored) => {
                let record = VersionedRecord::<M>::decode(stored)?;
                debug!(
                    collection = M::COLLECTION,
                    %id,
                    version = record.version.get(),
                    %actor,
                    "record updated"
                );
                self.audit(
                    AuditOperation::Update,
                    id,
                    record.version.get(),
                    fields,
                    actor,
                    now,
                );
                Ok(record)
            }
            None => Err(self.explain_miss(id, expected, Operation::Update)?),
        }
    }

    /// Delete a record without a version check. Returns true if it existed.
    pub fn delete(&self, id: &str, actor: &str) -> Result<bool, StoreError> {
        non_blank(id, "id")?;
        non_blank(actor, "actor")?;

        let removed = self
            .backend
            .delete(M::COLLECTION, id)
            .map_err(|e| self.backend_failure(e, Operation::Delete, id))?;

        let Some(version) = removed else {
            return Ok(false);
        };
        debug!(collection = M::COLLECTION, %id, version, %actor, "record deleted");
        self.audit(AuditOperation::Delete, id, version, Map::new(), actor, Utc::now());
        Ok(true)
    }

    /// Delete a record only if it is still at `expected_version`.
    pub fn delete_if_version(
        &self,
        id: &str,
        expected_version: i64,
        actor: &str,
    ) -> Result<(), StoreError> {
        let expected = Version::parse(expected_version)?;
        non_blank(id, "id")?;
        non_blank(actor, "actor")?;

        let removed = self
            .backend
            .delete_if_version(M::COLLECTION, id, expected.get())
            .map_err(|e| self.backend_failure(e, Operation::Delete, id))?;

        if removed {
            debug!(collection = M::COLLECTION, %id, version = expected.get(), %actor, "record deleted");
            self.audit(
                AuditOperation::Delete,
                id,
                expected.get(),
                Map::new(),
                actor,
                Utc::now(),
            );
            Ok(())
        } else {
            Err(self.explain_miss(id, expected, Operation::Delete)?)
        }
    }

    /// Records matching `filter`, newest first, cut to one page.
    pub fn list(
        &self,
        filter: impl Fn(&M) -> bool,
        page: PageRequest,
    ) -> Result<Page<VersionedRecord<M>>, StoreError> {
        self.list_sorted(filter, &SortRequest::default(), page)
    }

    /// Records matching `filter` in the requested order, cut to one page.
    pub fn list_sorted(
        &self,
        filter: impl Fn(&M) -> bool,
        sort: &SortRequest,
        page: PageRequest,
    ) -> Result<Page<VersionedRecord<M>>, StoreError> {
        let mut rows = self
            .backend
            .scan(M::COLLECTION)
            .map_err(|e| self.backend_failure(e, Operation::List, "*"))?;
        rows.sort_by(|a, b| sort.compare(a, b));

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = VersionedRecord::<M>::decode(row)?;
            if filter(&record.payload) {
                records.push(record);
            }
        }

        Ok(Page::slice(records, page))
    }

    /// Find out what happened to a write that failed with an unknown outcome.
    ///
    /// Call this instead of blindly resubmitting: if the original write did
    /// land, resubmitting the same patch would apply it twice.
    pub fn resolve_indeterminate(
        &self,
        id: &str,
        expected_version: i64,
    ) -> Result<Resolution<M>, StoreError> {
        let expected = Version::parse(expected_version)?;
        non_blank(id, "id")?;

        let Some(stored) = self.fetch(id, Operation::Read)? else {
            return Ok(Resolution::Missing);
        };
        let record = VersionedRecord::decode(stored)?;
        if record.version == expected {
            Ok(Resolution::NotApplied(record))
        } else {
            Ok(Resolution::Advanced(record))
        }
    }

    fn validate_update(
        &self,
        id: &str,
        expected_version: i64,
        patch: &M::Patch,
        actor: &str,
    ) -> Result<(Version, Map<String, serde_json::Value>), ValidationError> {
        let mut err = ValidationError::default();
        let expected = match Version::parse(expected_version) {
            Ok(version) => Some(version),
            Err(e) => {
                err.issues.extend(e.issues);
                None
            }
        };
        err.check(!id.trim().is_empty(), "id", "must not be empty");
        err.check(!actor.trim().is_empty(), "actor", "must not be empty");
        let fields = match to_fields(patch, "patch") {
            Ok(fields) => Some(fields),
            Err(e) => {
                err.issues.extend(e.issues);
                None
            }
        };

        match (expected, fields) {
            (Some(expected), Some(fields)) if err.is_empty() => Ok((expected, fields)),
            _ => Err(err),
        }
    }

    /// A conditional write matched nothing: the record is either gone or moved on.
    fn explain_miss(
        &self,
        id: &str,
        expected: Version,
        operation: Operation,
    ) -> Result<StoreError, StoreError> {
        match self.fetch(id, operation)? {
            None => Ok(self.not_found(id)),
            Some(current) => {
                info!(
                    collection = M::COLLECTION,
                    %id,
                    expected = expected.get(),
                    current = current.version,
                    %operation,
                    "version conflict"
                );
                Ok(StoreError::Conflict {
                    collection: M::COLLECTION,
                    id: id.to_string(),
                    expected: expected.get(),
                    current_version: current.version,
                    current: Some(current.payload),
                })
            }
        }
    }

    fn fetch(&self, id: &str, operation: Operation) -> Result<Option<StoredRecord>, StoreError> {
        self.backend
            .fetch(M::COLLECTION, id)
            .map_err(|e| self.backend_failure(e, operation, id))
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: M::COLLECTION,
            id: id.to_string(),
        }
    }

    fn backend_failure(
        &self,
        err: crate::backend::BackendError,
        operation: Operation,
        id: &str,
    ) -> StoreError {
        let err = StoreError::from_backend(err, operation, M::COLLECTION, id);
        if err.outcome_unknown() {
            warn!(collection = M::COLLECTION, %id, %operation, error = %err, "write outcome unknown");
        } else {
            warn!(collection = M::COLLECTION, %id, %operation, error = %err, "backend failure");
        }
        err
    }

    fn audit(
        &self,
        operation: AuditOperation,
        id: &str,
        version: u64,
        changes: Map<String, serde_json::Value>,
        actor: &str,
        at: DateTime<Utc>,
    ) {
        let Some(sink) = &self.audit else {
            return;
        };
        let entry = AuditEntry {
            operation,
            collection: M::COLLECTION,
            record_id: id.to_string(),
            version,
            changes,
            changed_by: actor.to_string(),
            changed_at: at,
        };
        if let Err(err) = sink.append(entry) {
            warn!(collection = M::COLLECTION, %id, error = %err, "audit entry dropped");
        }
    }
}

impl<B: RecordBackend, M: Record + Validate> VersionedRecordStore<B, M> {
    /// [`update`](Self::update), but the patch must also leave the record valid.
    ///
    /// Rules that span several fields (arrival after departure, say) cannot
    /// be checked on a patch alone. The patch is merged into the current
    /// record and the result validated before the conditional write. If the
    /// record is no longer at `expected_version` the merge is skipped and the
    /// write reports the conflict as usual.
    pub fn update_validated(
        &self,
        id: &str,
        expected_version: i64,
        patch: &M::Patch,
        actor: &str,
    ) -> Result<VersionedRecord<M>, StoreError> {
        let (expected, fields) = self.validate_update(id, expected_version, patch, actor)?;

        let Some(mut merged) = self.fetch(id, Operation::Read)? else {
            return Err(self.not_found(id));
        };
        if merged.version == expected.get() {
            ConditionalWrite {
                expected_version: expected.get(),
                fields,
                updated_by: actor.to_string(),
                updated_at: Utc::now(),
            }
            .apply_to(&mut merged);
            VersionedRecord::<M>::decode(merged)?.payload.validate()?;
        }

        self.update(id, expected_version, patch, actor)
    }
}
