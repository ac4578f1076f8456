use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use versioned_records::{
    http, BackendError, ConditionalWrite, FlightFare, InMemoryAuditLog, InMemoryBackend,
    RecordBackend, StoredRecord, VersionedRecordStore,
};

pub const ACTOR: &str = "user-1";

pub type FareStore = VersionedRecordStore<InMemoryBackend, FlightFare>;

pub fn fare_store() -> (Arc<FareStore>, InMemoryAuditLog) {
    let log = InMemoryAuditLog::new();
    let store: FareStore =
        VersionedRecordStore::new(InMemoryBackend::new()).with_audit(Arc::new(log.clone()));
    (Arc::new(store), log)
}

/// Bind to port 0 and return the actual address.
pub async fn start_server<B: RecordBackend + 'static>(
    store: Arc<VersionedRecordStore<B, FlightFare>>,
) -> String {
    let app = http::router(store);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn fare_body(departure: &str, base_price: f64) -> Value {
    json!({
        "flight_number": "EK202",
        "departure_airport_code": departure,
        "arrival_airport_code": "JFK",
        "departure_time": "2026-03-01T10:00:00Z",
        "arrival_time": "2026-03-01T20:00:00Z",
        "airline_code": "EK",
        "fare_class": "Economy",
        "base_price": base_price,
        "taxes": 0.0,
        "availability_status": "Available"
    })
}

pub async fn create_fare(client: &reqwest::Client, base: &str, body: Value) -> Value {
    let resp = client
        .post(format!("{base}/records"))
        .header(http::ACTOR_HEADER, ACTOR)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

/// In-memory backend whose conditional writes can be made to time out.
#[derive(Default)]
pub struct TimeoutBackend {
    inner: InMemoryBackend,
    time_out_writes: AtomicBool,
}

impl TimeoutBackend {
    pub fn time_out_writes(&self) {
        self.time_out_writes.store(true, Ordering::SeqCst);
    }
}

impl RecordBackend for TimeoutBackend {
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
        if self.time_out_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Timeout("no reply within 5s".into()));
        }
        self.inner.update_if_version(collection, id, write)
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
