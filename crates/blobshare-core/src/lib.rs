pub mod config;
pub mod constants;
pub mod signature;
pub mod size;

pub use config::{BlobshareConfig, RetryConfig, SchedulerConfig, ServerConfig, ValidatorConfig};
pub use constants::*;
pub use signature::{SignatureError, decode_signature_hex, encode_signature_hex};
pub use size::size_kb;
