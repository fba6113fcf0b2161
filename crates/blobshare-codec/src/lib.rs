//! blobshare-codec: pack an ordered batch of items into one payload.
//!
//! # Wire format
//!
//! Each item is encoded as five fields, concatenated with no separators
//! and no version byte:
//!
//! | field | width | encoding |
//! |---|---|---|
//! | rollup-ID length | 2 | big-endian `u16`, always `2` |
//! | rollup ID | 2 | big-endian `u16` |
//! | signature | 65 | raw bytes |
//! | data length | 2 | big-endian `u16` |
//! | data | variable | UTF-8 bytes |
//!
//! Items appear in the order they were passed to [`merge`], which is the
//! admission order chosen by the batch selector.

pub mod error;
pub mod wire;

pub use error::{CodecError, CodecResult};
pub use wire::{BlobEntry, merge, merge_hex, split, split_hex};
