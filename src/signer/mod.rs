//! Signer abstraction for batch transfers
//!
//! Private keys never enter the pipeline. Signing goes through a
//! [`SignerProvider`] (wallet adapter, keypair file, remote service...), and the
//! [`SignerGateway`] picks the first connected provider from a fixed priority
//! list and turns provider failures into the pipeline's error taxonomy.

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::TransferError;
use crate::types::TransactionEnvelope;

pub mod local;

pub use local::KeypairSigner;

/// Failure reported by a signer provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerFailure {
    /// The user declined the request
    #[error("user rejected the request")]
    UserRejected,

    #[error("signer timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// Capability set of an external signer
#[async_trait]
pub trait SignerProvider: Send + Sync {
    /// Human-readable provider name for logs and errors
    fn name(&self) -> &str;

    /// Public key that pays for and signs the transactions
    fn pubkey(&self) -> Pubkey;

    /// Whether the provider can currently sign
    async fn is_connected(&self) -> bool;

    /// Whether the provider implements [`SignerProvider::sign_all`]
    fn supports_batch_sign(&self) -> bool;

    /// Sign every transaction, returning them in the same order
    async fn sign_all(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, SignerFailure>;
}

/// Uniform sign-and-return contract over heterogeneous providers
pub struct SignerGateway {
    /// Providers in priority order
    providers: Vec<Arc<dyn SignerProvider>>,
    timeout: Duration,
    /// Providers are not guaranteed reentrant: one request at a time
    in_flight: Mutex<()>,
}

impl SignerGateway {
    pub fn new(providers: Vec<Arc<dyn SignerProvider>>, timeout: Duration) -> Self {
        Self {
            providers,
            timeout,
            in_flight: Mutex::new(()),
        }
    }

    /// First connected provider in priority order
    pub async fn detect_available(&self) -> Result<Arc<dyn SignerProvider>, TransferError> {
        for provider in &self.providers {
            if provider.is_connected().await {
                debug!(provider = provider.name(), "Signer provider detected");
                return Ok(Arc::clone(provider));
            }
        }
        Err(TransferError::NoSignerAvailable)
    }

    /// Detect a provider able to batch-sign and return its payer key
    pub async fn ensure_ready(&self) -> Result<Pubkey, TransferError> {
        let provider = self.detect_available().await?;
        if !provider.supports_batch_sign() {
            return Err(TransferError::UnsupportedSigner(provider.name().to_string()));
        }
        Ok(provider.pubkey())
    }

    /// First connected provider holding `payer`
    ///
    /// The payer is fixed when the envelope is built, so a provider that connects
    /// later with a different key is never asked to sign.
    async fn detect_for(&self, payer: &Pubkey) -> Result<Arc<dyn SignerProvider>, TransferError> {
        for provider in &self.providers {
            if provider.pubkey() != *payer {
                continue;
            }
            if provider.is_connected().await {
                return Ok(Arc::clone(provider));
            }
        }
        Err(TransferError::NoSignerAvailable)
    }

    /// Ask the provider owning the envelope's fee payer to sign it
    pub async fn request_signature(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<VersionedTransaction, TransferError> {
        let _guard = self.in_flight.lock().await;

        let payer = envelope
            .transaction
            .message
            .static_account_keys()
            .first()
            .copied()
            .ok_or_else(|| TransferError::Build("envelope has no fee payer".to_string()))?;
        let provider = self.detect_for(&payer).await?;
        if !provider.supports_batch_sign() {
            return Err(TransferError::UnsupportedSigner(provider.name().to_string()));
        }

        let request = provider.sign_all(vec![envelope.transaction.clone()]);
        let signed = match tokio::time::timeout(self.timeout, request).await {
            Err(_) => {
                warn!(
                    provider = provider.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Signer did not answer in time"
                );
                return Err(TransferError::SignerTimeout(self.timeout.as_millis() as u64));
            }
            Ok(Err(failure)) => return Err(classify_failure(failure, self.timeout)),
            Ok(Ok(signed)) => signed,
        };

        let count = signed.len();
        let tx = match <[VersionedTransaction; 1]>::try_from(signed) {
            Ok([tx]) => tx,
            Err(_) => {
                return Err(TransferError::SignerError(format!(
                    "{} returned {} transactions for 1 request",
                    provider.name(),
                    count
                )))
            }
        };

        if tx.signatures.first().map_or(true, |sig| *sig == Signature::default()) {
            return Err(TransferError::SignerError(format!(
                "{} returned an unsigned transaction",
                provider.name()
            )));
        }

        Ok(tx)
    }
}

fn classify_failure(failure: SignerFailure, timeout: Duration) -> TransferError {
    match failure {
        SignerFailure::UserRejected => TransferError::UserRejected,
        SignerFailure::Timeout => TransferError::SignerTimeout(timeout.as_millis() as u64),
        SignerFailure::Other(message) => TransferError::SignerError(message),
    }
}
