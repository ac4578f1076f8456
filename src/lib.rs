//! Optimistic-concurrency record store.
//!
//! Records are identified by `(id, version)`. Updates name the version the
//! caller last saw and succeed only if it is still current; the check and the
//! write are a single conditional write in the backend, so among concurrent
//! writers on the same version exactly one wins and the rest get
//! [`StoreError::Conflict`].

// Lets `#[derive(Record)]` expand to `versioned_records::Record` inside this crate too.
extern crate self as versioned_records;

mod audit;
mod backend;
mod config;
mod error;
mod fare;
mod query;
mod record;
mod retry;
mod store;
mod validation;

#[cfg(feature = "http")]
pub mod http;

pub use audit::{AuditEntry, AuditError, AuditOperation, AuditSink, InMemoryAuditLog};
pub use backend::{BackendError, ConditionalWrite, InMemoryBackend, RecordBackend, StoredRecord};
pub use config::{ConfigError, ServerConfig, DEFAULT_BIND_ADDR};
pub use error::{Operation, StoreError};
pub use fare::{AvailabilityStatus, FareClass, FareQuery, FlightFare, FlightFarePatch};
pub use query::{
    MatchAll, Page, PageMeta, PageRequest, Searchable, SortOrder, SortRequest, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use record::{Record, Version, VersionedRecord, RESERVED_KEYS};
pub use retry::{update_with_retry, RetryPolicy};
pub use store::{Resolution, VersionedRecordStore};
pub use validation::{FieldIssue, Validate, ValidationError};

// Derive macro for `Record`; also generates the `<Name>Patch` struct.
pub use versioned_records_macros::Record;
