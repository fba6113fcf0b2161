//! Merge and split of the length-prefixed batch format.

use serde::{Deserialize, Serialize};
use tracing::debug;

use blobshare_core::{
    ITEM_HEADER_LEN, MAX_DATA_LEN, MAX_ROLLUP_ID, ROLLUP_ID_LEN_WIDTH, ROLLUP_ID_WIDTH,
    SIGNATURE_LEN,
};

use crate::error::{CodecError, CodecResult};

/// One item of a packed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub rollup_id: u32,
    pub signature: Vec<u8>,
    pub data: String,
}

impl BlobEntry {
    /// Encoded length of this entry on the wire.
    pub fn encoded_len(&self) -> usize {
        ITEM_HEADER_LEN + self.data.len()
    }

    fn check(&self, index: usize) -> CodecResult<()> {
        let fail = |reason: String| CodecError::Encoding { index, reason };
        if self.rollup_id > MAX_ROLLUP_ID {
            return Err(fail(format!(
                "rollup id {} exceeds {MAX_ROLLUP_ID}",
                self.rollup_id
            )));
        }
        if self.signature.len() != SIGNATURE_LEN {
            return Err(fail(format!(
                "signature must be exactly {SIGNATURE_LEN} bytes, got {}",
                self.signature.len()
            )));
        }
        if self.data.len() > MAX_DATA_LEN {
            return Err(fail(format!(
                "data length {} exceeds maximum {MAX_DATA_LEN} bytes",
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// Encode `entries` into one contiguous payload, preserving order.
///
/// Every entry is checked before anything is written, so a failing call
/// produces no partial output.
pub fn merge(entries: &[BlobEntry]) -> CodecResult<Vec<u8>> {
    for (index, entry) in entries.iter().enumerate() {
        entry.check(index)?;
    }

    let total: usize = entries.iter().map(BlobEntry::encoded_len).sum();
    let mut out = Vec::with_capacity(total);
    for entry in entries {
        // Widths were checked above; the casts cannot truncate.
        out.extend_from_slice(&(ROLLUP_ID_WIDTH as u16).to_be_bytes());
        out.extend_from_slice(&(entry.rollup_id as u16).to_be_bytes());
        out.extend_from_slice(&entry.signature);
        out.extend_from_slice(&(entry.data.len() as u16).to_be_bytes());
        out.extend_from_slice(entry.data.as_bytes());
    }

    debug!(items = entries.len(), bytes = out.len(), "batch merged");
    Ok(out)
}

/// Decode a payload produced by [`merge`] back into its entries.
pub fn split(payload: &[u8]) -> CodecResult<Vec<BlobEntry>> {
    let mut reader = Reader::new(payload);
    let mut entries = Vec::new();

    while !reader.is_empty() {
        let id_width = reader.read_u16("rollup id length")? as usize;
        if id_width != ROLLUP_ID_WIDTH {
            return Err(CodecError::Decoding {
                offset: reader.offset - ROLLUP_ID_LEN_WIDTH,
                reason: format!("unsupported rollup id length: {id_width} bytes"),
            });
        }
        let rollup_id = u32::from(reader.read_u16("rollup id")?);
        let signature = reader.take(SIGNATURE_LEN, "signature")?.to_vec();
        let data_len = reader.read_u16("data length")? as usize;
        let data_start = reader.offset;
        let data = std::str::from_utf8(reader.take(data_len, "data")?)
            .map_err(|e| CodecError::Decoding {
                offset: data_start,
                reason: format!("data is not valid UTF-8: {e}"),
            })?
            .to_string();

        entries.push(BlobEntry {
            rollup_id,
            signature,
            data,
        });
    }

    debug!(items = entries.len(), bytes = payload.len(), "batch split");
    Ok(entries)
}

/// [`merge`], rendered as a `0x`-prefixed hex string.
pub fn merge_hex(entries: &[BlobEntry]) -> CodecResult<String> {
    Ok(format!("0x{}", hex::encode(merge(entries)?)))
}

/// [`split`] over a hex payload. The `0x` prefix is required.
pub fn split_hex(payload: &str) -> CodecResult<Vec<BlobEntry>> {
    let body = payload.strip_prefix("0x").ok_or_else(|| CodecError::Decoding {
        offset: 0,
        reason: "hex payload must start with 0x".to_string(),
    })?;
    let bytes = hex::decode(body).map_err(|e| CodecError::Decoding {
        offset: 0,
        reason: format!("invalid hex: {e}"),
    })?;
    split(&bytes)
}

/// Bounds-checked cursor over the payload.
struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.buf.len()
    }

    fn take(&mut self, len: usize, field: &str) -> CodecResult<&'a [u8]> {
        let remaining = self.buf.len() - self.offset;
        if remaining < len {
            return Err(CodecError::Decoding {
                offset: self.offset,
                reason: format!("truncated {field}: need {len} bytes, {remaining} remain"),
            });
        }
        let slice = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_u16(&mut self, field: &str) -> CodecResult<u16> {
        let bytes = self.take(2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}
