//! Caller-side conflict handling.
//!
//! The store never retries. Only the caller knows how to rebase its change on
//! a record that moved, so retrying is expressed here as a loop of
//! read → reconcile → conditional update, driven by a caller closure.

use tracing::debug;

use crate::backend::RecordBackend;
use crate::error::StoreError;
use crate::record::{Record, VersionedRecord};
use crate::store::VersionedRecordStore;

/// How many conditional updates to attempt before giving up on conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// Re-read, rebuild the patch, and update again until the write wins.
///
/// `reconcile` sees the freshest record and returns the patch to apply on
/// top of it, or `None` when nothing needs to change (the current record is
/// then returned as-is). Only `Conflict` is retried; `NotFound`,
/// `Validation` and `Transient` errors are returned immediately, and the last
/// `Conflict` is returned once the attempts run out.
pub fn update_with_retry<B, M, F>(
    store: &VersionedRecordStore<B, M>,
    id: &str,
    actor: &str,
    policy: RetryPolicy,
    mut reconcile: F,
) -> Result<VersionedRecord<M>, StoreError>
where
    B: RecordBackend,
    M: Record,
    F: FnMut(&VersionedRecord<M>) -> Option<M::Patch>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let current = store.read(id)?;
        let Some(patch) = reconcile(&current) else {
            return Ok(current);
        };

        match store.update(id, current.version.get() as i64, &patch, actor) {
            Err(err) if err.is_conflict() && attempt < max_attempts => {
                debug!(
                    collection = M::COLLECTION,
                    %id,
                    attempt,
                    max_attempts,
                    "retrying after version conflict"
                );
            }
            result => return result,
        }
    }
}
