//! Versioned records - the typed view of one stored row.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::StoredRecord;
use crate::error::StoreError;
use crate::validation::ValidationError;

/// Keys owned by the store. Payloads and patches may never carry them.
pub const RESERVED_KEYS: [&str; 6] = [
    "id",
    "version",
    "created_by",
    "created_at",
    "updated_by",
    "updated_at",
];

/// Trait for payload types that can be stored under optimistic concurrency.
///
/// Usually derived with `#[derive(Record)]`, which also generates the
/// `Patch` type.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection name for this record type (e.g. "flight_fares").
    /// Maps to a table in SQL, a collection in a document store, a key prefix in KV stores.
    const COLLECTION: &'static str;

    /// Partial update merged into the payload by `update`.
    type Patch: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;
}

/// A record version. Always positive; the first version is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub const INITIAL: Version = Version(1);

    /// Validate a caller-supplied version. Zero and negatives are rejected.
    pub fn parse(raw: i64) -> Result<Self, ValidationError> {
        if raw < 1 {
            return Err(ValidationError::field(
                "version",
                format!("must be a positive integer, got {}", raw),
            ));
        }
        Ok(Version(raw as u64))
    }

    pub(crate) fn from_stored(raw: u64) -> Self {
        Version(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record payload together with its version and provenance.
///
/// Serializes flat: the payload's fields sit next to `id` and `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord<M> {
    pub id: String,
    pub version: Version,
    #[serde(flatten)]
    pub payload: M,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl<M: Record> VersionedRecord<M> {
    pub(crate) fn decode(stored: StoredRecord) -> Result<Self, StoreError> {
        let payload: M = serde_json::from_value(Value::Object(stored.payload)).map_err(|e| {
            StoreError::Decode {
                collection: M::COLLECTION,
                id: stored.id.clone(),
                message: e.to_string(),
            }
        })?;

        Ok(VersionedRecord {
            id: stored.id,
            version: Version::from_stored(stored.version),
            payload,
            created_by: stored.created_by,
            created_at: stored.created_at,
            updated_by: stored.updated_by,
            updated_at: stored.updated_at,
        })
    }
}

/// Serialize a payload or patch into the column map written to the backend.
pub(crate) fn to_fields<T: Serialize>(
    value: &T,
    what: &'static str,
) -> Result<Map<String, Value>, ValidationError> {
    let value = serde_json::to_value(value)
        .map_err(|e| ValidationError::field(what, format!("not serializable: {}", e)))?;

    let Value::Object(fields) = value else {
        return Err(ValidationError::field(what, "must serialize to a JSON object"));
    };

    let mut err = ValidationError::default();
    for key in RESERVED_KEYS {
        if fields.contains_key(key) {
            err.push(key, "is managed by the store and cannot be written");
        }
    }
    err.into_result()?;

    Ok(fields)
}
