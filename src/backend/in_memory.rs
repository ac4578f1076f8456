//! InMemoryBackend - HashMap-backed record backend for testing and development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{BackendError, ConditionalWrite, RecordBackend, StoredRecord};

/// In-memory record backend backed by a HashMap.
///
/// Records are held per collection, then by id, so ids may contain any
/// character. Clone-friendly via Arc. Conditional writes hold the write lock
/// across the version check and the mutation, which is what makes them atomic.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    storage: Arc<RwLock<Collections>>,
}

type Collections = HashMap<String, HashMap<String, StoredRecord>>;

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all collections.
    pub fn len(&self) -> Result<usize, BackendError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| BackendError::Poisoned("len"))?;
        Ok(storage.values().map(HashMap::len).sum())
    }

    pub fn is_empty(&self) -> Result<bool, BackendError> {
        Ok(self.len()? == 0)
    }
}

impl RecordBackend for InMemoryBackend {
    fn fetch(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, BackendError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| BackendError::Poisoned("fetch"))?;
        Ok(storage
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    fn insert(&self, collection: &str, record: StoredRecord) -> Result<(), BackendError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| BackendError::Poisoned("insert"))?;

        let records = storage.entry(collection.to_string()).or_default();
        if records.contains_key(&record.id) {
            return Err(BackendError::DuplicateId {
                collection: collection.to_string(),
                id: record.id,
            });
        }

        records.insert(record.id.clone(), record);
        Ok(())
    }

    fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        write: ConditionalWrite,
    ) -> Result<Option<StoredRecord>, BackendError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| BackendError::Poisoned("update"))?;

        match storage
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
        {
            Some(stored) if stored.version == write.expected_version => {
                write.apply_to(stored);
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    fn delete(&self, collection: &str, id: &str) -> Result<Option<u64>, BackendError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| BackendError::Poisoned("delete"))?;

        Ok(storage
            .get_mut(collection)
            .and_then(|records| records.remove(id))
            .map(|removed| removed.version))
    }

    fn delete_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
    ) -> Result<bool, BackendError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| BackendError::Poisoned("delete"))?;

        let Some(records) = storage.get_mut(collection) else {
            return Ok(false);
        };
        if records.get(id).map(|s| s.version) == Some(expected_version) {
            records.remove(id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn scan(&self, collection: &str) -> Result<Vec<StoredRecord>, BackendError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| BackendError::Poisoned("scan"))?;

        Ok(storage
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}
