//! Concrete collaborators wired into the daemon.
//!
//! - [`LedgerValidator`]: funds from configured balances, structural
//!   signature checks unless signatures are trusted
//! - [`FileTransport`]: content-addressed batch files on local disk

pub mod telemetry;
pub mod transport;
pub mod validator;

pub use transport::FileTransport;
pub use validator::LedgerValidator;
