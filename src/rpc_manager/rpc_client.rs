//! [`NetworkClient`] over the nonblocking Solana RPC client
//!
//! Built from an explicit [`RpcConfig`]; nothing here reads endpoint selection
//! from global state.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature,
    transaction::{TransactionError, VersionedTransaction},
};
use solana_transaction_status::{TransactionConfirmationStatus, UiTransactionEncoding};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{
    ConfirmationLevel, NetworkClient, RpcManagerError, SignatureStatus, TransactionLookup,
};
use crate::config::RpcConfig;
use crate::metrics::Timer;
use crate::types::RecencyAnchor;

/// Poll interval used inside the anchor-scoped blocking confirmation
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct SolanaRpcClient {
    client: Arc<RpcClient>,
    endpoint: String,
}

impl std::fmt::Debug for SolanaRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpcClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl SolanaRpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self, RpcManagerError> {
        let commitment = config
            .commitment_config()
            .map_err(|e| RpcManagerError::Internal(e.to_string()))?;
        let client = RpcClient::new_with_timeout_and_commitment(
            config.url.clone(),
            Duration::from_secs(config.timeout_secs),
            commitment,
        );
        Ok(Self {
            client: Arc::new(client),
            endpoint: config.url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_err(&self, err: solana_client::client_error::ClientError) -> RpcManagerError {
        RpcManagerError::from_client_error(err, &self.endpoint)
    }
}

fn confirmation_level(status: &TransactionConfirmationStatus) -> ConfirmationLevel {
    match status {
        TransactionConfirmationStatus::Processed => ConfirmationLevel::Processed,
        TransactionConfirmationStatus::Confirmed => ConfirmationLevel::Confirmed,
        TransactionConfirmationStatus::Finalized => ConfirmationLevel::Finalized,
    }
}

/// The RPC answers `null` for unknown signatures, which the client surfaces as
/// a decode error rather than a typed "not found".
fn is_missing_transaction(err: &RpcManagerError) -> bool {
    match err {
        RpcManagerError::RpcResponse { message, .. } => {
            let lower = message.to_lowercase();
            lower.contains("invalid type: null") || lower.contains("not found")
        }
        _ => false,
    }
}

#[async_trait]
impl NetworkClient for SolanaRpcClient {
    #[instrument(skip(self), level = "debug")]
    async fn get_latest_anchor(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<RecencyAnchor, RpcManagerError> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(commitment)
            .await
            .map_err(|e| self.map_err(e))?;
        timer.finish();

        Ok(RecencyAnchor {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, RpcManagerError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(response.value)
    }

    async fn get_asset_decimals(&self, mint: &Pubkey) -> Result<u8, RpcManagerError> {
        let supply = self
            .client
            .get_token_supply(mint)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(supply.decimals)
    }

    async fn send_signed_envelope(
        &self,
        transaction: &VersionedTransaction,
        config: RpcSendTransactionConfig,
    ) -> Result<Signature, RpcManagerError> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let signature = self
            .client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| self.map_err(e))?;
        timer.finish();
        Ok(signature)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcManagerError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| self.map_err(e))?;

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatus {
                slot: status.slot,
                err: status.err.as_ref().map(failure_reason),
                confirmation: status.confirmation_status.as_ref().map(confirmation_level),
            }))
    }

    async fn confirm_signature(
        &self,
        signature: &Signature,
        anchor: &RecencyAnchor,
        commitment: CommitmentConfig,
    ) -> Result<Option<String>, RpcManagerError> {
        loop {
            let response = self
                .client
                .get_signature_statuses(&[*signature])
                .await
                .map_err(|e| self.map_err(e))?;

            if let Some(status) = response.value.into_iter().next().flatten() {
                if let Some(err) = status.err.as_ref() {
                    return Ok(Some(failure_reason(err)));
                }
                if status.satisfies_commitment(commitment) {
                    return Ok(None);
                }
            }

            let height = self
                .client
                .get_block_height_with_commitment(commitment)
                .await
                .map_err(|e| self.map_err(e))?;
            if height > anchor.last_valid_block_height {
                debug!(
                    signature = %signature,
                    block_height = height,
                    last_valid_block_height = anchor.last_valid_block_height,
                    "Anchor expired while confirming"
                );
                return Err(RpcManagerError::TransactionExpired {
                    endpoint: self.endpoint.clone(),
                });
            }

            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }

    async fn get_transaction_by_signature(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionLookup>, RpcManagerError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };

        match self.client.get_transaction_with_config(signature, config).await {
            Ok(tx) => Ok(Some(TransactionLookup {
                slot: tx.slot,
                err: tx
                    .transaction
                    .meta
                    .as_ref()
                    .and_then(|meta| meta.err.as_ref())
                    .map(failure_reason),
            })),
            Err(e) => {
                let err = self.map_err(e);
                if is_missing_transaction(&err) {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// On-chain failure text, identical whichever strategy observed it
fn failure_reason(err: &TransactionError) -> String {
    err.to_string()
}
