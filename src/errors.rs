//! Error taxonomy for the transfer pipeline
//!
//! Every failure a batch can hit maps to exactly one variant. The orchestrator
//! uses [`TransferError::is_retryable`] to decide whether to rebuild and retry a
//! batch, and [`TransferError::is_request_fatal`] to decide whether the whole
//! request must stop.

use crate::rpc_manager::RpcManagerError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Bad address or amount
    ///
    /// Local input problem. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No signer provider is connected
    #[error("No signer available: connect a wallet and try again")]
    NoSignerAvailable,

    /// The connected signer cannot sign a batch of transactions
    #[error("Unsupported signer '{0}': batch signing is not available")]
    UnsupportedSigner(String),

    /// The user declined the signature request
    #[error("Signature request rejected by user")]
    UserRejected,

    /// The signer did not answer in time
    #[error("Signer did not respond within {0}ms")]
    SignerTimeout(u64),

    /// Any other signer failure
    #[error("Signer error: {0}")]
    SignerError(String),

    /// The network refused the signed transaction
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Confirmation did not reach a terminal state in time
    ///
    /// Inconclusive: the transaction may still land. Retrying after this error
    /// can pay the same recipients twice.
    #[error("Confirmation timed out for {signature}; the transaction may still land")]
    ConfirmationTimeout { signature: String },

    /// The transaction landed with an on-chain error
    #[error("Transaction {signature} failed on-chain: {reason}")]
    TransactionFailed { signature: String, reason: String },

    /// Read-only network query failed while building
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcManagerError),

    /// Instruction list could not be compiled into a message
    #[error("Build error: {0}")]
    Build(String),

    /// Fee configuration is invalid; nothing can be sent
    #[error("Fatal configuration error: {0}")]
    FatalConfig(String),
}

impl TransferError {
    /// Check whether rebuilding the batch and trying again might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SignerTimeout(_) => true,
            Self::SignerError(_) => true,
            Self::Submission(_) => true,
            Self::ConfirmationTimeout { .. } => true,
            Self::TransactionFailed { .. } => true,
            Self::Rpc(_) => true,
            Self::Build(_) => true,

            Self::Validation(_) => false,
            Self::NoSignerAvailable => false,
            Self::UnsupportedSigner(_) => false,
            Self::UserRejected => false,
            Self::FatalConfig(_) => false,
        }
    }

    /// Errors that abort the whole request instead of a single batch
    pub fn is_request_fatal(&self) -> bool {
        matches!(self, Self::FatalConfig(_))
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NoSignerAvailable => "no_signer",
            Self::UnsupportedSigner(_) => "unsupported_signer",
            Self::UserRejected => "user_rejected",
            Self::SignerTimeout(_) => "signer_timeout",
            Self::SignerError(_) => "signer",
            Self::Submission(_) => "submission",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::TransactionFailed { .. } => "transaction_failed",
            Self::Rpc(_) => "rpc",
            Self::Build(_) => "build",
            Self::FatalConfig(_) => "config",
        }
    }
}

impl TransferError {
    pub fn invalid_address(address: &str, reason: impl std::fmt::Display) -> Self {
        Self::Validation(format!("invalid recipient address '{}': {}", address, reason))
    }

    pub fn confirmation_timeout(signature: &solana_sdk::signature::Signature) -> Self {
        Self::ConfirmationTimeout {
            signature: signature.to_string(),
        }
    }

    pub fn transaction_failed(
        signature: &solana_sdk::signature::Signature,
        reason: impl Into<String>,
    ) -> Self {
        Self::TransactionFailed {
            signature: signature.to_string(),
            reason: reason.into(),
        }
    }
}
