//! RPC Manager Module
//!
//! The narrow network surface the transfer pipeline depends on. Every pipeline
//! component talks to the chain only through [`NetworkClient`], so tests can swap
//! in scripted doubles and production wires [`SolanaRpcClient`].

use async_trait::async_trait;
use solana_rpc_client_api::config::RpcSendTransactionConfig;
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};

use crate::types::RecencyAnchor;

pub mod rpc_client;
pub mod rpc_errors;

pub use rpc_client::SolanaRpcClient;
pub use rpc_errors::RpcManagerError;

/// Commitment level reported for a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

/// Status of a submitted signature as reported by the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    /// On-chain execution error, if the transaction failed
    pub err: Option<String>,
    pub confirmation: Option<ConfirmationLevel>,
}

impl SignatureStatus {
    /// `confirmed` or `finalized` without an error
    pub fn is_confirmed(&self) -> bool {
        self.err.is_none()
            && matches!(
                self.confirmation,
                Some(ConfirmationLevel::Confirmed) | Some(ConfirmationLevel::Finalized)
            )
    }

    pub fn is_failed(&self) -> bool {
        self.err.is_some()
    }
}

/// A transaction found in the ledger by signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLookup {
    pub slot: u64,
    pub err: Option<String>,
}

/// Network operations used by the transfer pipeline
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Fetch a fresh blockhash and its last valid block height
    async fn get_latest_anchor(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<RecencyAnchor, RpcManagerError>;

    /// Fetch an account; `None` when it does not exist
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, RpcManagerError>;

    /// Decimals of an SPL token mint
    async fn get_asset_decimals(&self, mint: &Pubkey) -> Result<u8, RpcManagerError>;

    async fn send_signed_envelope(
        &self,
        transaction: &VersionedTransaction,
        config: RpcSendTransactionConfig,
    ) -> Result<Signature, RpcManagerError>;

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcManagerError>;

    /// Wait until the signature reaches `commitment` or the anchor expires.
    ///
    /// Returns `Ok(None)` on success, `Ok(Some(reason))` when the transaction
    /// landed with an error, and [`RpcManagerError::TransactionExpired`] once the
    /// chain moves past `anchor.last_valid_block_height`.
    async fn confirm_signature(
        &self,
        signature: &Signature,
        anchor: &RecencyAnchor,
        commitment: CommitmentConfig,
    ) -> Result<Option<String>, RpcManagerError>;

    async fn get_transaction_by_signature(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionLookup>, RpcManagerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_status_classification() {
        let finalized = SignatureStatus {
            slot: 10,
            err: None,
            confirmation: Some(ConfirmationLevel::Finalized),
        };
        assert!(finalized.is_confirmed());

        let processed = SignatureStatus {
            slot: 10,
            err: None,
            confirmation: Some(ConfirmationLevel::Processed),
        };
        assert!(!processed.is_confirmed());
        assert!(!processed.is_failed());

        let failed = SignatureStatus {
            slot: 10,
            err: Some("InstructionError(0, Custom(1))".to_string()),
            confirmation: Some(ConfirmationLevel::Confirmed),
        };
        assert!(!failed.is_confirmed());
        assert!(failed.is_failed());
    }
}
