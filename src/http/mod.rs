//! HTTP transport for a versioned record store.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `GET /records`: list, `?page=&limit=&sortBy=&sortOrder=` plus the record
//!   type's filters. Newest first unless a sort is given.
//! - `POST /records`: create. Body = payload. Returns 201 with `version: 1`.
//! - `GET /records/:id`: read. 404 if absent.
//! - `PUT /records/:id`: update. Body = `{ ...patch, "version": n }`.
//!   409 with `currentVersion` when another writer got there first, 400 when
//!   the patched record would fail validation.
//! - `DELETE /records/:id`: unconditional delete, or conditional with `?version=n`.
//! - `GET /health`: `{ "ok": true, "collection": ... }`.
//!
//! Writes need an `x-actor-id` header; its value is stamped as `updated_by`.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use versioned_records::{http, FlightFare, InMemoryBackend, VersionedRecordStore};
//!
//! let store = Arc::new(VersionedRecordStore::<_, FlightFare>::new(InMemoryBackend::new()));
//!
//! // Get the router to compose with other axum routes
//! let app = http::router(store.clone());
//!
//! // Or serve directly
//! http::serve(store, "0.0.0.0:3000").await?;
//! ```

mod error;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::backend::RecordBackend;
use crate::query::{Page, PageRequest, Searchable, SortRequest};
use crate::record::{Record, VersionedRecord};
use crate::store::VersionedRecordStore;
use crate::validation::{Validate, ValidationError};

pub use error::ApiError;

/// Header carrying the identity stamped on writes.
pub const ACTOR_HEADER: &str = "x-actor-id";

type SharedStore<B, M> = Arc<VersionedRecordStore<B, M>>;

/// Build an axum `Router` serving one record collection.
pub fn router<B, M>(store: SharedStore<B, M>) -> Router
where
    B: RecordBackend + 'static,
    M: Searchable + Validate,
    M::Patch: Validate,
{
    Router::new()
        .route("/health", get(health_handler::<B, M>))
        .route(
            "/records",
            get(list_handler::<B, M>).post(create_handler::<B, M>),
        )
        .route(
            "/records/:id",
            get(read_handler::<B, M>)
                .put(update_handler::<B, M>)
                .delete(delete_handler::<B, M>),
        )
        .with_state(store)
}

/// Serve the store over HTTP at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve<B, M>(store: SharedStore<B, M>, addr: &str) -> Result<(), std::io::Error>
where
    B: RecordBackend + 'static,
    M: Searchable + Validate,
    M::Patch: Validate,
{
    let collection = store.collection();
    let app = router(store);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, collection, "serving records");
    axum::serve(listener, app).await
}

#[derive(Debug, Default, Deserialize)]
struct DeleteParams {
    version: Option<i64>,
}

/// `GET /health`
async fn health_handler<B, M>(State(store): State<SharedStore<B, M>>) -> impl IntoResponse
where
    B: RecordBackend + 'static,
    M: Record,
{
    Json(json!({ "ok": true, "collection": store.collection() }))
}

/// `GET /records`
async fn list_handler<B, M>(
    State(store): State<SharedStore<B, M>>,
    Query(page): Query<PageRequest>,
    Query(sort): Query<SortRequest>,
    Query(filter): Query<M::Query>,
) -> Result<Json<Page<VersionedRecord<M>>>, ApiError>
where
    B: RecordBackend + 'static,
    M: Searchable,
{
    let page = store.list_sorted(|record| record.matches(&filter), &sort, page)?;
    Ok(Json(page))
}

/// `POST /records`
async fn create_handler<B, M>(
    State(store): State<SharedStore<B, M>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<VersionedRecord<M>>), ApiError>
where
    B: RecordBackend + 'static,
    M: Record + Validate,
{
    let payload: M =
        serde_json::from_value(body).map_err(|e| ApiError::MalformedPayload(e.to_string()))?;
    payload.validate()?;
    let actor = actor_from_headers(&headers)?;

    let record = store.create(&payload, &actor)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /records/:id`
async fn read_handler<B, M>(
    State(store): State<SharedStore<B, M>>,
    Path(id): Path<String>,
) -> Result<Json<VersionedRecord<M>>, ApiError>
where
    B: RecordBackend + 'static,
    M: Record,
{
    Ok(Json(store.read(&id)?))
}

/// `PUT /records/:id`
async fn update_handler<B, M>(
    State(store): State<SharedStore<B, M>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<VersionedRecord<M>>, ApiError>
where
    B: RecordBackend + 'static,
    M: Record + Validate,
    M::Patch: Validate,
{
    let (version, patch) = split_update_body::<M>(body)?;
    patch.validate()?;
    let actor = actor_from_headers(&headers)?;

    Ok(Json(store.update_validated(&id, version, &patch, &actor)?))
}

/// `DELETE /records/:id`
async fn delete_handler<B, M>(
    State(store): State<SharedStore<B, M>>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError>
where
    B: RecordBackend + 'static,
    M: Record,
{
    let actor = actor_from_headers(&headers)?;
    match params.version {
        Some(version) => store.delete_if_version(&id, version, &actor)?,
        None => {
            store.delete(&id, &actor)?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Pull `version` out of an update body and decode the rest as a patch.
fn split_update_body<M: Record>(body: Value) -> Result<(i64, M::Patch), ApiError> {
    let Value::Object(mut fields) = body else {
        return Err(ApiError::MalformedPayload(
            "body must be a JSON object".into(),
        ));
    };

    let version = match fields.remove("version") {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
            ValidationError::field("version", "must be a positive integer")
        })?,
        Some(_) => {
            return Err(ValidationError::field("version", "must be a positive integer").into())
        }
        None => return Err(ValidationError::field("version", "is required").into()),
    };

    let patch = serde_json::from_value(Value::Object(fields))
        .map_err(|e| ApiError::MalformedPayload(e.to_string()))?;
    Ok((version, patch))
}

/// Extract the acting identity from request headers.
fn actor_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|actor| !actor.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Unauthorized)
}
