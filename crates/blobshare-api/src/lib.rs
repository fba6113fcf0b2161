//! blobshare-api: REST API for blobshare.
//!
//! Provides axum route handlers for blob intake and for inspecting the
//! pending queue, the adaptive weights and the flush log.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/blobs/post-blob` | Submit a blob for admission |
//! | GET | `/api/blobs/weights` | Current weight state |
//! | GET | `/api/blobs/pending` | Pending items by priority |
//! | GET | `/api/blobs/flushes` | Recent flushes, newest first |
//! | POST | `/api/blobs/unpack` | Split a packed hex payload |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use blobshare_scheduler::AdmissionPipeline;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<AdmissionPipeline>,
}

/// Build the complete API router.
pub fn build_router(pipeline: Arc<AdmissionPipeline>) -> Router {
    let api_state = ApiState { pipeline };

    let blob_routes = Router::new()
        .route("/post-blob", post(handlers::post_blob))
        .route("/weights", get(handlers::get_weights))
        .route("/pending", get(handlers::list_pending))
        .route("/flushes", get(handlers::list_flushes))
        .route("/unpack", post(handlers::unpack))
        .with_state(api_state);

    Router::new()
        .nest("/api/blobs", blob_routes)
        .route("/healthz", get(handlers::healthz))
}
