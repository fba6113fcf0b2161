//! End-to-end tests through the HTTP router.
//!
//! Drives the full stack (router, pipeline, ledger validator, file
//! transport, state store) without binding a socket.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use blobshare_api::build_router;
use blobshare_codec::split;
use blobshare_core::{SchedulerConfig, ValidatorConfig};
use blobshare_scheduler::{AdmissionPipeline, RetryPolicy};
use blobshare_state::StateStore;
use blobshared::{FileTransport, LedgerValidator};

const PRODUCER: &str = "0xproducer";

struct Harness {
    router: Router,
    store: StateStore,
    batches: std::path::PathBuf,
    _tmp: tempfile::TempDir,
}

/// Threshold and capacity of 1 KB: the third 0.5 KB submission flushes two.
fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let store = StateStore::open_in_memory().unwrap();

    let mut balances = HashMap::new();
    balances.insert(PRODUCER.to_string(), 10.0);
    let validator = Arc::new(LedgerValidator::from_config(&ValidatorConfig {
        trust_signatures: false,
        balances,
    }));
    let batches = tmp.path().join("batches");
    let transport = Arc::new(FileTransport::new(&batches).unwrap());

    let config = SchedulerConfig {
        flush_threshold_kb: 1.0,
        capacity_kb: 1.0,
        ..Default::default()
    };
    let pipeline =
        AdmissionPipeline::new(store.clone(), config, validator, transport, RetryPolicy::none()).unwrap();

    Harness {
        router: build_router(Arc::new(pipeline)),
        store,
        batches,
        _tmp: tmp,
    }
}

fn signature_hex() -> String {
    format!("0x{}1b", "22".repeat(64))
}

/// `0xproducer` (10) + 130 + 884 bytes = 1024 bytes = 0.5 KB.
fn blob_body(rollup_id: u32, bid: f64) -> serde_json::Value {
    serde_json::json!({
        "identity": PRODUCER,
        "rollupId": rollup_id,
        "signature": signature_hex(),
        "data": "d".repeat(884),
        "bid": bid,
    })
}

fn post(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_ok() {
    let h = harness();
    let resp = h.router.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn post_blob_pending_then_flush() {
    let h = harness();

    let resp = h
        .router
        .clone()
        .oneshot(post("/api/blobs/post-blob", &blob_body(1, 0.1)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["accepted"], true);
    assert_eq!(body["data"]["flushed"], false);

    h.router
        .clone()
        .oneshot(post("/api/blobs/post-blob", &blob_body(2, 0.3)))
        .await
        .unwrap();
    let resp = h
        .router
        .clone()
        .oneshot(post("/api/blobs/post-blob", &blob_body(3, 0.2)))
        .await
        .unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["data"]["flushed"], true);
    let reference = body["data"]["transportRef"].as_str().unwrap().to_string();

    // Highest bids first; the lowest stays queued.
    let digest = reference.strip_prefix("0x").unwrap();
    let payload = std::fs::read(h.batches.join(format!("{digest}.blob"))).unwrap();
    let packed: Vec<u32> = split(&payload).unwrap().iter().map(|e| e.rollup_id).collect();
    assert_eq!(packed, vec![2, 3]);

    let resp = h.router.clone().oneshot(get("/api/blobs/pending")).await.unwrap();
    let body = json_body(resp).await;
    let pending = body["data"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["rollup_id"], 1);

    let resp = h.router.clone().oneshot(get("/api/blobs/flushes?limit=5")).await.unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["data"][0]["transport_ref"], reference.as_str());

    let resp = h.router.oneshot(get("/api/blobs/weights")).await.unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["data"]["current_accumulated_size_kb"], 0.0);
    assert_eq!(h.store.list_flushes(10).unwrap().len(), 1);
}

#[tokio::test]
async fn post_blob_missing_field_is_rejected() {
    let h = harness();
    let mut body = blob_body(1, 0.1);
    body.as_object_mut().unwrap().remove("signature");

    let resp = h.router.oneshot(post("/api/blobs/post-blob", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["success"], false);
    assert!(h.store.list_items().unwrap().is_empty());
}

#[tokio::test]
async fn post_blob_unknown_producer_is_rejected() {
    let h = harness();
    let mut body = blob_body(1, 0.1);
    body["identity"] = serde_json::json!("0xstranger");

    let resp = h.router.oneshot(post("/api/blobs/post-blob", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.store.list_items().unwrap().is_empty());
}

#[tokio::test]
async fn unpack_round_trips_a_written_batch() {
    let h = harness();
    for (rollup_id, bid) in [(7, 0.1), (8, 0.2), (9, 0.3)] {
        h.router
            .clone()
            .oneshot(post("/api/blobs/post-blob", &blob_body(rollup_id, bid)))
            .await
            .unwrap();
    }
    let flushes = h.store.list_flushes(1).unwrap();
    let digest = flushes[0].transport_ref.strip_prefix("0x").unwrap();
    let payload = std::fs::read(h.batches.join(format!("{digest}.blob"))).unwrap();
    let hex_payload = format!("0x{}", hex::encode(payload));

    let resp = h
        .router
        .oneshot(post("/api/blobs/unpack", &serde_json::json!({ "payload": hex_payload })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["rollupId"], 9);
    assert_eq!(entries[0]["signature"], signature_hex());
}
