//! Structured logging for batch lifecycle events

use crate::errors::TransferError;
use crate::observability::CorrelationId;
use crate::types::TransferSummary;

/// Structured logger for one transfer request
#[derive(Debug, Clone)]
pub struct TransferLogger {
    correlation_id: CorrelationId,
}

impl TransferLogger {
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self { correlation_id }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn log_request_start(&self, recipients: usize, batches: usize, asset: &str) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            recipients = %recipients,
            batches = %batches,
            asset = %asset,
            "Starting batch transfer"
        );
    }

    pub fn log_attempt(&self, batch_index: usize, attempt: u32, max_attempts: u32) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            batch = %batch_index,
            attempt = %attempt,
            max_attempts = %max_attempts,
            "Batch attempt started"
        );
    }

    pub fn log_submitted(&self, batch_index: usize, signature: &str) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            batch = %batch_index,
            signature = %signature,
            "Batch submitted"
        );
    }

    pub fn log_batch_success(&self, batch_index: usize, signature: &str, attempts: u32, latency_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            batch = %batch_index,
            signature = %signature,
            attempts = %attempts,
            latency_ms = %latency_ms,
            "Batch confirmed"
        );
    }

    pub fn log_attempt_failure(&self, batch_index: usize, attempt: u32, error: &TransferError) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            batch = %batch_index,
            attempt = %attempt,
            category = error.category(),
            retryable = error.is_retryable(),
            error = %error,
            "Batch attempt failed"
        );
    }

    /// A retry after an inconclusive confirmation may pay the batch twice
    pub fn log_duplicate_risk(&self, batch_index: usize, signature: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            batch = %batch_index,
            previous_signature = %signature,
            "Retrying after confirmation timeout; the previous transaction may still land and pay these recipients twice"
        );
    }

    pub fn log_batch_failure(&self, batch_index: usize, attempts: u32, error: &str) {
        tracing::error!(
            correlation_id = %self.correlation_id,
            batch = %batch_index,
            attempts = %attempts,
            error = %error,
            "Batch failed"
        );
    }

    pub fn log_summary(&self, summary: &TransferSummary) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            batches_succeeded = %summary.batches_succeeded,
            batches_failed = %summary.batches_failed,
            recipients_paid = %summary.recipients_paid,
            recipients_unpaid = %summary.recipients_unpaid,
            "Batch transfer finished"
        );
    }

    pub fn error(&self, message: &str) {
        tracing::error!(
            correlation_id = %self.correlation_id,
            message = %message,
            "Error"
        );
    }
}
