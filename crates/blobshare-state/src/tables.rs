//! redb table definitions for the blobshare state store.
//!
//! Data tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Index tables map item ids to `()`.

use redb::TableDefinition;

/// Submission items keyed by `{id}`.
pub const ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("items");

/// Ids of items still waiting for admission. Mirrors `!processed`.
pub const PENDING: TableDefinition<&str, ()> = TableDefinition::new("pending");

/// Ids of admitted items whose batch has not been acknowledged yet.
pub const RESERVED: TableDefinition<&str, ()> = TableDefinition::new("reserved");

/// The weight state, stored under [`WEIGHTS_KEY`].
pub const WEIGHTS: TableDefinition<&str, &[u8]> = TableDefinition::new("weights");

/// Completed flushes keyed by `{flushed_at:020}:{transport_ref}`.
pub const FLUSHES: TableDefinition<&str, &[u8]> = TableDefinition::new("flushes");

/// Key of the singleton row in [`WEIGHTS`].
pub const WEIGHTS_KEY: &str = "current";
