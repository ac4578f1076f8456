use std::sync::Arc;

use super::{BackendError, ConditionalWrite, StoredRecord};

/// Abstract persistence for versioned records.
///
/// Every method is a single round trip. Implementations must make
/// `update_if_version` and `delete_if_version` atomic: the version check and
/// the write are one operation, never a read followed by a write.
pub trait RecordBackend: Send + Sync {
    /// Fetch a record by id. Returns None if not found.
    fn fetch(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, BackendError>;

    /// Insert a new record. Fails with `DuplicateId` if the id is taken.
    fn insert(&self, collection: &str, record: StoredRecord) -> Result<(), BackendError>;

    /// Conditionally update a record.
    ///
    /// Returns the updated row when exactly one row matched `id` and
    /// `write.expected_version`, and `None` when zero rows matched (either
    /// the record is absent or its version moved on).
    fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        write: ConditionalWrite,
    ) -> Result<Option<StoredRecord>, BackendError>;

    /// Delete a record unconditionally. Returns the version it had, or
    /// `None` if it did not exist.
    fn delete(&self, collection: &str, id: &str) -> Result<Option<u64>, BackendError>;

    /// Delete a record only if its version equals `expected_version`.
    /// Returns true if a row was removed.
    fn delete_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
    ) -> Result<bool, BackendError>;

    /// All records of a collection, in no particular order.
    fn scan(&self, collection: &str) -> Result<Vec<StoredRecord>, BackendError>;
}

impl<B: RecordBackend + ?Sized> RecordBackend for Arc<B> {
    fn fetch(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, BackendError> {
        (**self).fetch(collection, id)
    }

    fn insert(&self, collection: &str, record: StoredRecord) -> Result<(), BackendError> {
        (**self).insert(collection, record)
    }

    fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        write: ConditionalWrite,
    ) -> Result<Option<StoredRecord>, BackendError> {
        (**self).update_if_version(collection, id, write)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<Option<u64>, BackendError> {
        (**self).delete(collection, id)
    }

    fn delete_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
    ) -> Result<bool, BackendError> {
        (**self).delete_if_version(collection, id, expected_version)
    }

    fn scan(&self, collection: &str) -> Result<Vec<StoredRecord>, BackendError> {
        (**self).scan(collection)
    }
}
