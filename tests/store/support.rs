//! Shared record types and a fault-injecting backend.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use versioned_records::{
    BackendError, ConditionalWrite, InMemoryBackend, Record, RecordBackend, StoredRecord,
    VersionedRecordStore,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[record(collection = "prices")]
pub struct Price {
    pub price: i64,
    pub note: Option<String>,
}

pub fn price(value: i64) -> Price {
    Price {
        price: value,
        note: None,
    }
}

pub fn set_price(value: i64) -> PricePatch {
    PricePatch {
        price: Some(value),
        ..Default::default()
    }
}

pub fn store() -> VersionedRecordStore<InMemoryBackend, Price> {
    VersionedRecordStore::new(InMemoryBackend::new())
}

/// How the next conditional write should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The request never reached the backend.
    RequestLost,
    /// The write was applied but the reply never arrived.
    ReplyLost,
}

/// Wraps an in-memory backend and injects failures or competing writers.
#[derive(Default)]
pub struct FlakyBackend {
    inner: InMemoryBackend,
    fault: Mutex<Option<Fault>>,
    interleaved_writes: Mutex<u32>,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_write(&self, fault: Fault) {
        *self.fault.lock().unwrap() = Some(fault);
    }

    /// Let another writer win the race before each of the next `count` conditional writes.
    pub fn interleave_writes(&self, count: u32) {
        *self.interleaved_writes.lock().unwrap() = count;
    }

    fn competing_write(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        if let Some(current) = self.inner.fetch(collection, id)? {
            let mut fields = serde_json::Map::new();
            fields.insert("note".into(), serde_json::json!("touched by another writer"));
            self.inner.update_if_version(
                collection,
                id,
                ConditionalWrite {
                    expected_version: current.version,
                    fields,
                    updated_by: "someone-else".into(),
                    updated_at: chrono::Utc::now(),
                },
            )?;
        }
        Ok(())
    }
}

impl RecordBackend for FlakyBackend {
    fn fetch(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, BackendError> {
        self.inner.fetch(collection, id)
    }

    fn insert(&self, collection: &str, record: StoredRecord) -> Result<(), BackendError> {
        self.inner.insert(collection, record)
    }

    fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        write: ConditionalWrite,
    ) -> Result<Option<StoredRecord>, BackendError> {
        {
            let mut remaining = self.interleaved_writes.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                drop(remaining);
                self.competing_write(collection, id)?;
            }
        }

        let fault = self.fault.lock().unwrap().take();
        match fault {
            None => self.inner.update_if_version(collection, id, write),
            Some(Fault::RequestLost) => Err(BackendError::Unavailable("connection reset".into())),
            Some(Fault::ReplyLost) => {
                self.inner.update_if_version(collection, id, write)?;
                Err(BackendError::Timeout("no reply within 5s".into()))
            }
        }
    }

    fn delete(&self, collection: &str, id: &str) -> Result<Option<u64>, BackendError> {
        self.inner.delete(collection, id)
    }

    fn delete_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
    ) -> Result<bool, BackendError> {
        self.inner.delete_if_version(collection, id, expected_version)
    }

    fn scan(&self, collection: &str) -> Result<Vec<StoredRecord>, BackendError> {
        self.inner.scan(collection)
    }
}
