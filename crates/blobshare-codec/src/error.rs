//! Codec error types.

use thiserror::Error;

/// Errors raised by a single merge or split call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("encoding error at item {index}: {reason}")]
    Encoding { index: usize, reason: String },

    #[error("decoding error at offset {offset}: {reason}")]
    Decoding { offset: usize, reason: String },
}

pub type CodecResult<T> = Result<T, CodecError>;
