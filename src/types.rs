//! Common types used throughout the transfer pipeline

use crate::errors::TransferError;
use crate::tx_builder::amount::DecimalAmount;
use serde::{Deserialize, Serialize};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};

/// A request to pay the same amount to every recipient
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Recipient addresses in payout order (deduplicated upstream)
    pub recipients: Vec<String>,

    /// Amount paid to each recipient, in whole units of the asset
    pub amount_per_recipient: DecimalAmount,

    /// SPL token mint; `None` pays native SOL
    pub asset: Option<Pubkey>,
}

impl TransferRequest {
    pub fn native(recipients: Vec<String>, amount_per_recipient: DecimalAmount) -> Self {
        Self {
            recipients,
            amount_per_recipient,
            asset: None,
        }
    }

    pub fn token(recipients: Vec<String>, amount_per_recipient: DecimalAmount, mint: Pubkey) -> Self {
        Self {
            recipients,
            amount_per_recipient,
            asset: Some(mint),
        }
    }
}

/// A contiguous slice of recipients sent in one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of this batch in the request
    pub index: usize,
    pub recipients: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// Recent blockhash plus the last block height at which it is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyAnchor {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// A compiled, signable transaction for one attempt of one batch
///
/// Envelopes are never reused: every retry builds a new one against a new anchor.
#[derive(Debug, Clone)]
pub struct TransactionEnvelope {
    pub transaction: VersionedTransaction,
    pub anchor: RecencyAnchor,
    pub instruction_count: usize,
}

/// Terminal status of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Success,
    Error,
}

/// Outcome of one batch, exactly one per batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub batch_index: usize,

    /// Last signature seen for this batch; empty if nothing was ever submitted
    pub signature: String,

    pub status: TransferStatus,

    /// Unix timestamp in milliseconds when the batch reached its terminal state
    pub timestamp_ms: i64,

    pub recipients: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Number of pipeline attempts made for this batch
    pub attempts: u32,
}

impl TransferResult {
    pub fn success(batch: &Batch, signature: &Signature, attempts: u32) -> Self {
        Self {
            batch_index: batch.index,
            signature: signature.to_string(),
            status: TransferStatus::Success,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            recipients: batch.recipients.clone(),
            error_message: None,
            attempts,
        }
    }

    pub fn failure(batch: &Batch, retry: &RetryState) -> Self {
        Self {
            batch_index: batch.index,
            signature: retry
                .last_signature
                .map(|sig| sig.to_string())
                .unwrap_or_default(),
            status: TransferStatus::Error,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            recipients: batch.recipients.clone(),
            error_message: Some(
                retry
                    .last_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            attempts: retry.attempt_count,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }
}

/// Per-batch retry bookkeeping, dropped when the batch reaches a terminal state
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    pub attempt_count: u32,
    pub last_signature: Option<Signature>,
    pub last_error: Option<TransferError>,
}

/// Result of validating a raw recipient list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
    pub duplicates: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty() && self.duplicates.is_empty()
    }
}

/// Aggregate view over a finished request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub batches_total: usize,
    pub batches_succeeded: usize,
    pub batches_failed: usize,
    pub recipients_paid: usize,
    pub recipients_unpaid: usize,
    pub total_attempts: u32,
}

impl TransferSummary {
    pub fn from_results(results: &[TransferResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            acc.batches_total += 1;
            acc.total_attempts += r.attempts;
            if r.is_success() {
                acc.batches_succeeded += 1;
                acc.recipients_paid += r.recipients.len();
            } else {
                acc.batches_failed += 1;
                acc.recipients_unpaid += r.recipients.len();
            }
            acc
        })
    }
}
