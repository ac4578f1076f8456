use std::sync::Arc;

use serde_json::{json, Value};
use versioned_records::{http::ACTOR_HEADER, AuditOperation, FlightFare, VersionedRecordStore};

use crate::support::{
    create_fare, fare_body, fare_store, start_server, TimeoutBackend, ACTOR,
};

#[tokio::test]
async fn health_check() {
    let (store, _) = fare_store();
    let base = start_server(store).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true, "collection": "flight_fares" }));
}

#[tokio::test]
async fn create_and_read_fare() {
    let (store, _) = fare_store();
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    let created = create_fare(&client, &base, fare_body("DXB", 100.0)).await;
    assert_eq!(created["version"], 1);
    assert_eq!(created["base_price"], 100.0);
    assert_eq!(created["created_by"], ACTOR);
    let id = created["id"].as_str().unwrap();

    let resp = client.get(format!("{base}/records/{id}")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let read: Value = resp.json().await.unwrap();
    assert_eq!(read, created);
}

#[tokio::test]
async fn update_then_conflict() {
    let (store, log) = fare_store();
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    let created = create_fare(&client, &base, fare_body("DXB", 100.0)).await;
    let id = created["id"].as_str().unwrap().to_string();
    let url = format!("{base}/records/{id}");

    // Update from version 1
    let resp = client
        .put(&url)
        .header(ACTOR_HEADER, ACTOR)
        .json(&json!({ "base_price": 120.0, "version": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["version"], 2);
    assert_eq!(body["base_price"], 120.0);

    // Client A wins from version 2
    let resp = client
        .put(&url)
        .header(ACTOR_HEADER, "client-a")
        .json(&json!({ "base_price": 130.0, "version": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Client B is stale
    let resp = client
        .put(&url)
        .header(ACTOR_HEADER, "client-b")
        .json(&json!({ "base_price": 140.0, "version": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Concurrent update detected");
    assert_eq!(body["currentVersion"], 3);
    assert_eq!(body["current"]["base_price"], 130.0);

    let read: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(read["base_price"], 130.0);
    assert_eq!(read["updated_by"], "client-a");

    let history = log.history(&id).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].operation, AuditOperation::Create);
    assert_eq!(history[2].changed_by, "client-a");
}

#[tokio::test]
async fn update_unknown_fare_is_not_found() {
    let (store, _) = fare_store();
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{base}/records/nonexistent"))
        .header(ACTOR_HEADER, ACTOR)
        .json(&json!({ "availability_status": "Sold Out", "version": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{base}/records/nonexistent"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn bad_versions_and_payloads_are_rejected() {
    let (store, _) = fare_store();
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    let created = create_fare(&client, &base, fare_body("DXB", 100.0)).await;
    let url = format!("{base}/records/{}", created["id"].as_str().unwrap());

    for body in [
        json!({ "base_price": 120.0, "version": 0 }),
        json!({ "base_price": 120.0, "version": -1 }),
        json!({ "base_price": 120.0 }),
        json!({ "base_price": -5.0, "version": 1 }),
        json!({ "bogus_field": 1, "version": 1 }),
        json!({ "fare_class": "Premium", "version": 1 }),
    ] {
        let resp = client
            .put(&url)
            .header(ACTOR_HEADER, ACTOR)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "body {body} should be rejected");
    }

    // Nothing was written
    let read: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(read["version"], 1);
    assert_eq!(read["base_price"], 100.0);

    let resp = client
        .post(format!("{base}/records"))
        .header(ACTOR_HEADER, ACTOR)
        .json(&fare_body("DUBAI", 100.0))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["details"][0]["field"], "departure_airport_code");
}

#[tokio::test]
async fn writes_require_an_actor() {
    let (store, _) = fare_store();
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/records"))
        .json(&fare_body("DXB", 100.0))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let created = create_fare(&client, &base, fare_body("DXB", 100.0)).await;
    let resp = client
        .put(format!("{base}/records/{}", created["id"].as_str().unwrap()))
        .json(&json!({ "base_price": 120.0, "version": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn delete_unconditional_and_versioned() {
    let (store, _) = fare_store();
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    // Unconditional
    let created = create_fare(&client, &base, fare_body("DXB", 100.0)).await;
    let url = format!("{base}/records/{}", created["id"].as_str().unwrap());
    let resp = client
        .delete(&url)
        .header(ACTOR_HEADER, ACTOR)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    // Conditional
    let created = create_fare(&client, &base, fare_body("DXB", 100.0)).await;
    let url = format!("{base}/records/{}", created["id"].as_str().unwrap());
    client
        .put(&url)
        .header(ACTOR_HEADER, ACTOR)
        .json(&json!({ "taxes": 10.0, "version": 1 }))
        .send()
        .await
        .unwrap();

    let resp = client
        .delete(format!("{url}?version=1"))
        .header(ACTOR_HEADER, ACTOR)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["currentVersion"], 2);

    let resp = client
        .delete(format!("{url}?version=2"))
        .header(ACTOR_HEADER, ACTOR)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .delete(format!("{url}?version=2"))
        .header(ACTOR_HEADER, ACTOR)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let (store, _) = fare_store();
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    for (departure, price) in [("DXB", 100.0), ("DXB", 300.0), ("KTM", 200.0), ("DXB", 500.0)] {
        create_fare(&client, &base, fare_body(departure, price)).await;
    }

    let resp = client
        .get(format!("{base}/records?departure=dxb&maxPrice=400&limit=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["meta"],
        json!({ "page": 1, "limit": 1, "total": 2, "totalPages": 2 })
    );
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["departure_airport_code"], "DXB");

    let body: Value = client
        .get(format!("{base}/records?limit=500"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["meta"]["limit"], 100);
    assert_eq!(body["meta"]["total"], 4);
}

#[tokio::test]
async fn update_leaving_fare_invalid_is_rejected() {
    let (store, _) = fare_store();
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    let created = create_fare(&client, &base, fare_body("DXB", 100.0)).await;
    let url = format!("{base}/records/{}", created["id"].as_str().unwrap());

    // Departure is 10:00, so a 05:00 arrival breaks the schedule
    let resp = client
        .put(&url)
        .header(ACTOR_HEADER, ACTOR)
        .json(&json!({ "arrival_time": "2026-03-01T05:00:00Z", "version": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["details"][0]["field"], "arrival_time");

    let read: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(read["version"], 1);
    assert_eq!(read["arrival_time"], "2026-03-01T20:00:00Z");

    let resp = client
        .put(&url)
        .header(ACTOR_HEADER, ACTOR)
        .json(&json!({ "arrival_time": "2026-03-01T21:00:00Z", "version": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn timed_out_update_reports_unknown_outcome() {
    let backend = Arc::new(TimeoutBackend::default());
    let store = Arc::new(VersionedRecordStore::<_, FlightFare>::new(backend.clone()));
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    let created = create_fare(&client, &base, fare_body("DXB", 100.0)).await;
    backend.time_out_writes();

    let resp = client
        .put(format!("{base}/records/{}", created["id"].as_str().unwrap()))
        .header(ACTOR_HEADER, ACTOR)
        .json(&json!({ "base_price": 120.0, "version": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "UNAVAILABLE");
    assert_eq!(body["outcomeUnknown"], true);
}

#[tokio::test]
async fn list_honours_sort_params() {
    let (store, _) = fare_store();
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    for price in [300.0, 100.0, 200.0] {
        create_fare(&client, &base, fare_body("DXB", price)).await;
    }

    let body: Value = client
        .get(format!("{base}/records?sortBy=base_price&sortOrder=asc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let prices: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|fare| fare["base_price"].as_f64().unwrap())
        .collect();
    assert_eq!(prices, vec![100.0, 200.0, 300.0]);

    let body: Value = client
        .get(format!("{base}/records?sortBy=base_price"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"][0]["base_price"], 300.0);
}
