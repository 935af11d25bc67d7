//! Batch transfer orchestration
//!
//! Splits a request into fixed-size batches and drives each batch through
//! build → sign → submit → confirm, retrying from a fresh build on retryable
//! failures. Batches run strictly one after another, and every batch yields
//! exactly one [`TransferResult`].

use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, Instrument};

use crate::config::{Config, FeeConfig, TransferConfig, MAX_TOKEN_BATCH_SIZE};
use crate::confirmation::{Confirmation, ConfirmationWatcher};
use crate::errors::TransferError;
use crate::metrics::{metrics, Timer};
use crate::observability::{batch_span, request_span, CorrelationId};
use crate::rpc_manager::NetworkClient;
use crate::signer::SignerGateway;
use crate::structured_logging::TransferLogger;
use crate::submitter::Submitter;
use crate::tx_builder::{InstructionBuilder, TransactionAssembler, NATIVE_DECIMALS};
use crate::types::{
    Batch, RecencyAnchor, RetryState, TransactionEnvelope, TransferRequest, TransferResult,
    TransferSummary,
};

/// Split `recipients` into consecutive batches of at most `batch_size`, preserving order
pub fn partition(recipients: &[String], batch_size: usize) -> Vec<Batch> {
    recipients
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            recipients: chunk.to_vec(),
        })
        .collect()
}

/// Lifecycle of one batch
///
/// Each in-flight state carries what the next step needs. A retryable failure
/// below the attempt limit goes back to `Building`, so a retry never reuses an
/// envelope, a signature or an anchor.
#[derive(Debug, Clone)]
pub enum BatchState {
    Building,
    Signing(TransactionEnvelope),
    Submitting {
        transaction: VersionedTransaction,
        anchor: RecencyAnchor,
    },
    Confirming {
        signature: Signature,
        anchor: RecencyAnchor,
    },
    Succeeded(Signature),
    FailedAfterRetries,
}

#[derive(Debug, Clone)]
pub enum BatchEvent {
    EnvelopeBuilt(TransactionEnvelope),
    Signed(VersionedTransaction),
    Submitted(Signature),
    Confirmed,
    AttemptFailed { retryable: bool },
}

impl BatchState {
    pub fn name(&self) -> &'static str {
        match self {
            BatchState::Building => "building",
            BatchState::Signing(_) => "signing",
            BatchState::Submitting { .. } => "submitting",
            BatchState::Confirming { .. } => "confirming",
            BatchState::Succeeded(_) => "succeeded",
            BatchState::FailedAfterRetries => "failed_after_retries",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Succeeded(_) | BatchState::FailedAfterRetries)
    }

    /// Transition on `event` during attempt number `attempt` of `max_attempts`
    pub fn on_event(self, event: BatchEvent, attempt: u32, max_attempts: u32) -> BatchState {
        match (self, event) {
            (BatchState::Building, BatchEvent::EnvelopeBuilt(envelope)) => BatchState::Signing(envelope),
            (BatchState::Signing(envelope), BatchEvent::Signed(transaction)) => BatchState::Submitting {
                transaction,
                anchor: envelope.anchor,
            },
            (BatchState::Submitting { anchor, .. }, BatchEvent::Submitted(signature)) => {
                BatchState::Confirming { signature, anchor }
            }
            (BatchState::Confirming { signature, .. }, BatchEvent::Confirmed) => {
                BatchState::Succeeded(signature)
            }
            (state, BatchEvent::AttemptFailed { retryable }) if !state.is_terminal() => {
                if retryable && attempt < max_attempts {
                    BatchState::Building
                } else {
                    BatchState::FailedAfterRetries
                }
            }
            (state, event) if state.is_terminal() => {
                tracing::debug!(state = state.name(), ?event, "Event ignored in terminal state");
                state
            }
            (state, event) => {
                error!(state = state.name(), ?event, "Unexpected batch event");
                BatchState::FailedAfterRetries
            }
        }
    }
}

/// Drives a [`TransferRequest`] through the pipeline, one batch at a time
pub struct BatchOrchestrator {
    transfer: TransferConfig,
    fee: FeeConfig,
    builder: InstructionBuilder,
    assembler: TransactionAssembler,
    signer: SignerGateway,
    submitter: Submitter,
    watcher: ConfirmationWatcher,
}

impl BatchOrchestrator {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        signer: SignerGateway,
        config: &Config,
    ) -> Result<Self, TransferError> {
        let commitment = config.rpc.commitment_config()?;
        let transfer = config.transfer.clone();

        Ok(Self {
            builder: InstructionBuilder::new(Arc::clone(&network), config.fee.clone()),
            assembler: TransactionAssembler::new(Arc::clone(&network), commitment),
            submitter: Submitter::new(Arc::clone(&network), transfer.send_max_retries),
            watcher: ConfirmationWatcher::new(
                network,
                commitment,
                Duration::from_millis(transfer.polling_interval_ms),
            ),
            signer,
            fee: config.fee.clone(),
            transfer,
        })
    }

    /// Pay every recipient of `request`, returning one result per batch in order.
    ///
    /// # Errors
    ///
    /// Only request-level problems are returned as `Err`: no recipients, an
    /// amount that rounds to nothing, an invalid fee configuration, a token
    /// request with batches too large for one packet, or no usable signer. Anything that goes wrong inside a batch is reported in
    /// that batch's [`TransferResult`].
    pub async fn transfer(&self, request: &TransferRequest) -> Result<Vec<TransferResult>, TransferError> {
        if request.recipients.is_empty() {
            return Err(TransferError::Validation("no recipients to pay".to_string()));
        }
        self.fee.resolve()?;
        match request.asset {
            None => {
                request.amount_per_recipient.to_minimal_units(NATIVE_DECIMALS)?;
            }
            Some(_) if self.transfer.batch_size > MAX_TOKEN_BATCH_SIZE => {
                return Err(TransferError::Validation(format!(
                    "token batches hold at most {} recipients, batch_size is {}",
                    MAX_TOKEN_BATCH_SIZE, self.transfer.batch_size
                )));
            }
            Some(_) => {}
        }
        let payer = self.signer.ensure_ready().await?;

        let batches = partition(&request.recipients, self.transfer.batch_size);
        let logger = TransferLogger::new(CorrelationId::new());
        let span = request_span(logger.correlation_id(), request.recipients.len(), batches.len());

        async {
            let asset = request
                .asset
                .map(|mint| mint.to_string())
                .unwrap_or_else(|| "SOL".to_string());
            logger.log_request_start(request.recipients.len(), batches.len(), &asset);

            let mut results = Vec::with_capacity(batches.len());
            for batch in &batches {
                if batch.index > 0 {
                    tokio::time::sleep(Duration::from_millis(self.transfer.batch_delay_ms)).await;
                }

                let result = self
                    .run_batch(batch, request, &payer, &logger)
                    .instrument(batch_span(batch.index, batch.len()))
                    .await;

                match result {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        logger.error(&format!("Aborting request: {}", e));
                        return Err(e);
                    }
                }
            }

            logger.log_summary(&TransferSummary::from_results(&results));
            Ok(results)
        }
        .instrument(span)
        .await
    }

    async fn run_batch(
        &self,
        batch: &Batch,
        request: &TransferRequest,
        payer: &Pubkey,
        logger: &TransferLogger,
    ) -> Result<TransferResult, TransferError> {
        let timer = Timer::with_name("batch_latency_seconds");
        let max_attempts = self.transfer.max_retries.max(1);
        let mut retry = RetryState::default();
        let mut state = BatchState::Building;

        loop {
            let step = match &state {
                BatchState::Building => {
                    if retry.attempt_count > 0 {
                        if let Some(TransferError::ConfirmationTimeout { signature }) = &retry.last_error {
                            logger.log_duplicate_risk(batch.index, signature);
                        }
                        tokio::time::sleep(Duration::from_millis(self.transfer.retry_delay_ms)).await;
                        metrics().batch_retries.inc();
                    }
                    retry.attempt_count += 1;
                    metrics().batch_attempts.inc();
                    logger.log_attempt(batch.index, retry.attempt_count, max_attempts);

                    self.build_envelope(batch, request, payer)
                        .await
                        .map(BatchEvent::EnvelopeBuilt)
                }
                BatchState::Signing(envelope) => self
                    .signer
                    .request_signature(envelope)
                    .await
                    .map(BatchEvent::Signed),
                BatchState::Submitting { transaction, .. } => self
                    .submitter
                    .submit(transaction)
                    .await
                    .map(BatchEvent::Submitted),
                BatchState::Confirming { signature, anchor } => {
                    let timeout = Duration::from_millis(self.transfer.confirmation_timeout_ms);
                    match self.watcher.watch(signature, anchor, timeout).await {
                        Ok(Confirmation::Landed) => Ok(BatchEvent::Confirmed),
                        Ok(Confirmation::Failed(reason)) => {
                            Err(TransferError::transaction_failed(signature, reason))
                        }
                        Err(e) => Err(e),
                    }
                }
                BatchState::Succeeded(signature) => {
                    let latency_ms = (timer.elapsed_secs() * 1_000.0) as u64;
                    timer.finish();
                    metrics().batches_succeeded.inc();
                    metrics().recipients_paid.inc_by(batch.len() as u64);
                    logger.log_batch_success(
                        batch.index,
                        &signature.to_string(),
                        retry.attempt_count,
                        latency_ms,
                    );
                    return Ok(TransferResult::success(batch, signature, retry.attempt_count));
                }
                BatchState::FailedAfterRetries => {
                    timer.finish();
                    metrics().batches_failed.inc();
                    let result = TransferResult::failure(batch, &retry);
                    logger.log_batch_failure(
                        batch.index,
                        retry.attempt_count,
                        result.error_message.as_deref().unwrap_or_default(),
                    );
                    return Ok(result);
                }
            };

            let event = match step {
                Ok(event) => {
                    if let BatchEvent::Submitted(signature) = &event {
                        retry.last_signature = Some(*signature);
                        logger.log_submitted(batch.index, &signature.to_string());
                    }
                    event
                }
                Err(e) if e.is_request_fatal() => return Err(e),
                Err(e) => {
                    metrics().record_error(e.category());
                    logger.log_attempt_failure(batch.index, retry.attempt_count, &e);
                    let retryable = e.is_retryable();
                    retry.last_error = Some(e);
                    BatchEvent::AttemptFailed { retryable }
                }
            };

            state = state.on_event(event, retry.attempt_count, max_attempts);
        }
    }

    async fn build_envelope(
        &self,
        batch: &Batch,
        request: &TransferRequest,
        payer: &Pubkey,
    ) -> Result<TransactionEnvelope, TransferError> {
        let timer = Timer::with_name("build_latency_seconds");
        let plan = self
            .builder
            .build_instructions(
                &batch.recipients,
                &request.amount_per_recipient,
                payer,
                request.asset.as_ref(),
            )
            .await?;
        let envelope = self.assembler.assemble(&plan.instructions, payer).await?;
        timer.finish();
        Ok(envelope)
    }
}
