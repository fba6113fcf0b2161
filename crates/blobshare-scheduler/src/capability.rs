//! External capabilities consumed by the admission pipeline.
//!
//! Signature verification, funds checks and the downstream hand-off of a
//! packed batch live outside the scheduler. They are injected as trait
//! objects so deployments and tests can supply their own.

use std::future::Future;
use std::pin::Pin;

/// Boxed future alias for capability calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Credential and funds checks for an incoming submission.
///
/// An `Err` is treated exactly like `Ok(false)`: the submission is
/// rejected.
pub trait Validator: Send + Sync {
    /// Whether `signature` is a valid signature by `identity` over `data`.
    fn verify_signature<'a>(
        &'a self,
        identity: &'a str,
        data: &'a str,
        signature: &'a [u8],
    ) -> BoxFuture<'a, Result<bool, String>>;

    /// Whether `identity` holds enough funds to cover `bid`.
    fn check_funds<'a>(&'a self, identity: &'a str, bid: f64) -> BoxFuture<'a, Result<bool, String>>;
}

/// Downstream sink for packed batches.
pub trait Transport: Send + Sync {
    /// Submit a packed batch. Returns a transport reference (for example
    /// a transaction hash). Failures may be transient.
    fn submit_packed_batch<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<String, String>>;
}
