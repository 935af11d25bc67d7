//! Broadcast of signed transactions

use solana_rpc_client_api::config::RpcSendTransactionConfig;
use solana_sdk::{
    commitment_config::CommitmentLevel, signature::Signature, transaction::VersionedTransaction,
};
use std::sync::Arc;
use tracing::debug;

use crate::errors::TransferError;
use crate::rpc_manager::NetworkClient;

/// Sends a signed transaction once, leaving rebroadcast to the node
pub struct Submitter {
    network: Arc<dyn NetworkClient>,
    send_max_retries: usize,
}

impl Submitter {
    pub fn new(network: Arc<dyn NetworkClient>, send_max_retries: usize) -> Self {
        Self {
            network,
            send_max_retries,
        }
    }

    /// Preflight-checked send configuration
    pub fn send_config(&self) -> RpcSendTransactionConfig {
        RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
            max_retries: Some(self.send_max_retries),
            ..Default::default()
        }
    }

    /// Broadcast `transaction` and return its signature.
    ///
    /// Any refusal (preflight simulation, transport, rate limit) is reported as
    /// [`TransferError::Submission`]; the orchestrator retries with a rebuilt envelope.
    pub async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, TransferError> {
        let signature = self
            .network
            .send_signed_envelope(transaction, self.send_config())
            .await
            .map_err(|e| TransferError::Submission(e.to_string()))?;

        debug!(signature = %signature, "Transaction accepted by RPC node");
        Ok(signature)
    }
}
