//! Hex signature parsing.
//!
//! Producers send signatures as hex strings, optionally `0x`-prefixed.
//! Internally a signature is always the raw 65-byte form.

use thiserror::Error;

use crate::constants::{SIGNATURE_HEX_LEN, SIGNATURE_LEN};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature must be exactly {SIGNATURE_HEX_LEN} hex characters, got {0}")]
    Length(usize),

    #[error("signature is not valid hex: {0}")]
    Hex(String),
}

/// Decode a hex signature (with or without `0x`) into its raw bytes.
pub fn decode_signature_hex(signature: &str) -> Result<Vec<u8>, SignatureError> {
    let stripped = signature.strip_prefix("0x").unwrap_or(signature);
    if stripped.len() != SIGNATURE_HEX_LEN {
        return Err(SignatureError::Length(stripped.len()));
    }
    let bytes = hex::decode(stripped).map_err(|e| SignatureError::Hex(e.to_string()))?;
    debug_assert_eq!(bytes.len(), SIGNATURE_LEN);
    Ok(bytes)
}

/// Render raw signature bytes as a `0x`-prefixed lowercase hex string.
pub fn encode_signature_hex(signature: &[u8]) -> String {
    format!("0x{}", hex::encode(signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_prefixed_and_bare() {
        let bare = "ab".repeat(SIGNATURE_LEN);
        let prefixed = format!("0x{bare}");
        assert_eq!(decode_signature_hex(&bare).unwrap(), vec![0xab; SIGNATURE_LEN]);
        assert_eq!(decode_signature_hex(&prefixed).unwrap(), vec![0xab; SIGNATURE_LEN]);
    }

    #[test]
    fn rejects_wrong_length() {
        let short = "ab".repeat(64);
        assert_eq!(decode_signature_hex(&short), Err(SignatureError::Length(128)));
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "zz".repeat(SIGNATURE_LEN);
        assert!(matches!(decode_signature_hex(&bad), Err(SignatureError::Hex(_))));
    }

    #[test]
    fn encode_is_prefixed() {
        let hex = encode_signature_hex(&[0x01; SIGNATURE_LEN]);
        assert!(hex.starts_with("0x01"));
        assert_eq!(hex.len(), SIGNATURE_HEX_LEN + 2);
    }
}
