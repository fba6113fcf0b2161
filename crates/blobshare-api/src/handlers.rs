//! REST API handlers.
//!
//! Intake goes through the admission pipeline; everything else reads the
//! state store. All responses use the same JSON envelope.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use blobshare_codec::split_hex;
use blobshare_core::encode_signature_hex;
use blobshare_scheduler::{SchedulerError, SubmissionRequest, priority_order};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn internal_error(e: impl std::fmt::Display) -> axum::response::Response {
    error!(error = %e, "request failed");
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

// ── Intake ─────────────────────────────────────────────────────

/// POST /api/blobs/post-blob
pub async fn post_blob(
    State(state): State<ApiState>,
    Json(req): Json<SubmissionRequest>,
) -> impl IntoResponse {
    match state.pipeline.submit(req).await {
        Ok(outcome) => {
            info!(
                item_id = %outcome.item_id,
                flushed = outcome.flushed,
                "blob accepted"
            );
            ApiResponse::ok(outcome).into_response()
        }
        Err(SchedulerError::Validation(msg)) => {
            error_response(&msg, StatusCode::BAD_REQUEST).into_response()
        }
        Err(e) => internal_error(e),
    }
}

// ── Inspection ─────────────────────────────────────────────────

/// GET /api/blobs/weights
pub async fn get_weights(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.pipeline.weights().await)
}

/// GET /api/blobs/pending
pub async fn list_pending(State(state): State<ApiState>) -> impl IntoResponse {
    match state.pipeline.store().list_pending() {
        Ok(mut items) => {
            items.sort_by(priority_order);
            ApiResponse::ok(items).into_response()
        }
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct FlushQuery {
    pub limit: Option<usize>,
}

const DEFAULT_FLUSH_LIMIT: usize = 50;

/// GET /api/blobs/flushes?limit=N
pub async fn list_flushes(
    State(state): State<ApiState>,
    Query(query): Query<FlushQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_FLUSH_LIMIT);
    match state.pipeline.store().list_flushes(limit) {
        Ok(flushes) => ApiResponse::ok(flushes).into_response(),
        Err(e) => internal_error(e),
    }
}

// ── Unpack ─────────────────────────────────────────────────────

/// Unpack request body.
#[derive(Debug, Deserialize)]
pub struct UnpackRequest {
    /// `0x`-prefixed hex of a packed batch.
    pub payload: String,
}

/// One entry of an unpacked batch, signature re-encoded as hex.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpackedEntry {
    pub rollup_id: u32,
    pub signature: String,
    pub data: String,
}

/// POST /api/blobs/unpack
pub async fn unpack(Json(req): Json<UnpackRequest>) -> impl IntoResponse {
    match split_hex(&req.payload) {
        Ok(entries) => {
            let entries: Vec<UnpackedEntry> = entries
                .into_iter()
                .map(|e| UnpackedEntry {
                    rollup_id: e.rollup_id,
                    signature: encode_signature_hex(&e.signature),
                    data: e.data,
                })
                .collect();
            ApiResponse::ok(entries).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
