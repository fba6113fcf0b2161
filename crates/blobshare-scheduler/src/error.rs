//! Scheduler error types.

use serde::Serialize;
use thiserror::Error;

use blobshare_state::ItemId;

/// Errors that can occur while admitting or flushing submissions.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Missing or malformed input, or a failed credential/funds check.
    /// Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("codec error: {0}")]
    Codec(#[from] blobshare_codec::CodecError),

    #[error("state store error: {0}")]
    State(#[from] blobshare_state::StateError),

    /// The flush task panicked or was aborted. Its reservation is released
    /// on the next startup.
    #[error("flush task failed: {0}")]
    Flush(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// An item whose own size exceeds the batch capacity. It can never be
/// admitted and keeps aging; reported as a warning, not a failure.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("item {item_id} ({size_kb} KB) exceeds batch capacity of {capacity_kb} KB")]
pub struct CapacityError {
    pub item_id: ItemId,
    pub size_kb: f64,
    pub capacity_kb: f64,
}
