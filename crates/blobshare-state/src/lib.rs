//! blobshare-state: embedded state store for blobshare.
//!
//! Backed by [redb](https://docs.rs/redb), holds the submission items,
//! the singleton weight state, and the log of completed flushes.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Items are keyed by their time-ordered id, flush records by
//! `{flushed_at}:{transport_ref}` so a table scan yields them in order.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Writes that must be observed
//! together (rescored items plus the weights that produced them) go
//! through a single write transaction.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
