//! Listing support: filters, sorting and pagination.

use std::cmp::Ordering;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::StoredRecord;
use crate::record::Record;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Requested page. Out-of-range values are clamped, never rejected:
/// page is at least 1, limit is within 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }.clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Listing order, decoded from `?sortBy=&sortOrder=`. Defaults to newest first.
///
/// `sort_by` names a provenance column (`id`, `version`, `created_by`,
/// `created_at`, `updated_by`, `updated_at`) or a payload key. Records
/// without the key sort as if it were null, below every other value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SortRequest {
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl Default for SortRequest {
    fn default() -> Self {
        Self {
            sort_by: "created_at".to_string(),
            sort_order: SortOrder::Desc,
        }
    }
}

impl SortRequest {
    pub fn new(sort_by: impl Into<String>, sort_order: SortOrder) -> Self {
        Self {
            sort_by: sort_by.into(),
            sort_order,
        }
    }

    /// Ties are broken by id, ascending, whatever the order.
    pub fn compare(&self, a: &StoredRecord, b: &StoredRecord) -> Ordering {
        let ordering = match self.sort_by.as_str() {
            "id" => a.id.cmp(&b.id),
            "version" => a.version.cmp(&b.version),
            "created_by" => a.created_by.cmp(&b.created_by),
            "created_at" => a.created_at.cmp(&b.created_at),
            "updated_by" => a.updated_by.cmp(&b.updated_by),
            "updated_at" => a.updated_at.cmp(&b.updated_at),
            key => compare_values(a.payload.get(key), b.payload.get(key)),
        };
        let ordering = match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        ordering.then_with(|| a.id.cmp(&b.id))
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => {
            // Timestamps with differing fractional digits do not sort as text.
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Cut one page out of an already filtered and ordered list.
    pub fn slice(items: Vec<T>, request: PageRequest) -> Self {
        let request = request.clamped();
        let total = items.len();
        let limit = request.limit as usize;
        let data = items
            .into_iter()
            .skip(request.offset())
            .take(limit)
            .collect();

        Page {
            data,
            meta: PageMeta {
                page: request.page,
                limit: request.limit,
                total,
                total_pages: total.div_ceil(limit),
            },
        }
    }
}

/// Record types that can be filtered by a query decoded from a URL.
pub trait Searchable: Record {
    type Query: for<'de> Deserialize<'de> + Default + Send + Sync + 'static;

    fn matches(&self, query: &Self::Query) -> bool;
}

/// Query that matches every record.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MatchAll {}
