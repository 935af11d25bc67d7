//! Batch value transfers on Solana
//!
//! Pays one amount of SOL or an SPL token to many recipients, packing them into
//! fixed-size batches of one transaction each. Every batch is built, signed by an
//! external signer, submitted and confirmed independently, with bounded retries.

pub mod address;
pub mod config;
pub mod confirmation;
pub mod errors;
pub mod metrics;
pub mod observability;
pub mod orchestrator;
pub mod rpc_manager;
pub mod signer;
pub mod structured_logging;
pub mod submitter;
pub mod tx_builder;
pub mod types;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use errors::TransferError;
pub use orchestrator::{partition, BatchOrchestrator};
pub use types::{TransferRequest, TransferResult, TransferStatus};
