//! Submission size derivation.
//!
//! The size of a submission is fixed when it is stored and never
//! recomputed. It depends only on the identity, the hex-encoded signature
//! and the data payload, never on the bid.

use crate::constants::SIGNATURE_HEX_LEN;

/// Derive the accounting size of a submission in kilobytes.
///
/// Counts the UTF-8 length of the address, the hex form of the signature
/// and the data, converts to KB rounded to three decimals, then halves it
/// (hex characters carry half a byte each on the wire).
pub fn size_kb(address: &str, data: &str) -> f64 {
    let bytes = address.len() + SIGNATURE_HEX_LEN + data.len();
    let kb = (bytes as f64 / 1024.0 * 1000.0).round() / 1000.0;
    kb / 2.0
}
