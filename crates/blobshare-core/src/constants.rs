//! Wire-format constants shared by the codec, intake, and size derivation.

/// Width in bytes of an ECDSA signature carried per item.
pub const SIGNATURE_LEN: usize = 65;

/// Width of a signature when carried as a hex string (no `0x` prefix).
pub const SIGNATURE_HEX_LEN: usize = SIGNATURE_LEN * 2;

/// Width in bytes of the rollup-ID field. Also the value written into
/// the rollup-ID length prefix.
pub const ROLLUP_ID_WIDTH: usize = 2;

/// Width in bytes of the rollup-ID length prefix.
pub const ROLLUP_ID_LEN_WIDTH: usize = 2;

/// Width in bytes of the data length prefix.
pub const DATA_LEN_WIDTH: usize = 2;

/// Largest encodable rollup ID.
pub const MAX_ROLLUP_ID: u32 = u16::MAX as u32;

/// Largest encodable data payload in bytes.
pub const MAX_DATA_LEN: usize = u16::MAX as usize;

/// Fixed per-item overhead on the wire (everything but `data`).
pub const ITEM_HEADER_LEN: usize =
    ROLLUP_ID_LEN_WIDTH + ROLLUP_ID_WIDTH + SIGNATURE_LEN + DATA_LEN_WIDTH;
