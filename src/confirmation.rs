//! Confirmation tracking for submitted transactions
//!
//! A signature is watched until it reaches a terminal state or the deadline
//! passes. Each polling cycle tries three strategies in order:
//!
//! 1. blocking confirm against the transaction's recency anchor
//! 2. signature status lookup
//! 3. full transaction lookup
//!
//! The first conclusive answer wins. Strategy errors are never fatal, they only
//! make that strategy inconclusive for the current cycle.

use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::TransferError;
use crate::metrics::{metrics, Timer};
use crate::rpc_manager::{NetworkClient, RpcManagerError};
use crate::types::RecencyAnchor;

/// Confirmation strategy tried within a polling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    BlockingConfirm,
    SignatureStatus,
    TransactionLookup,
}

impl Strategy {
    /// Next strategy in the cycle, wrapping back to the blocking confirm
    pub fn next(self) -> Self {
        match self {
            Strategy::BlockingConfirm => Strategy::SignatureStatus,
            Strategy::SignatureStatus => Strategy::TransactionLookup,
            Strategy::TransactionLookup => Strategy::BlockingConfirm,
        }
    }
}

/// Result of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Confirmed,
    /// Landed with an on-chain error
    Failed(String),
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Polling(Strategy),
    Confirmed,
    Failed(String),
    TimedOut,
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WatchState::Polling(_))
    }
}

/// Transition function of the watcher; terminal states absorb every outcome
pub fn next_state(state: WatchState, outcome: ProbeOutcome) -> WatchState {
    match (state, outcome) {
        (WatchState::Polling(_), ProbeOutcome::Confirmed) => WatchState::Confirmed,
        (WatchState::Polling(_), ProbeOutcome::Failed(reason)) => WatchState::Failed(reason),
        (WatchState::Polling(strategy), ProbeOutcome::Inconclusive) => {
            WatchState::Polling(strategy.next())
        }
        (terminal, _) => terminal,
    }
}

/// Definitive answer for a watched signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Landed,
    Failed(String),
}

pub struct ConfirmationWatcher {
    network: Arc<dyn NetworkClient>,
    commitment: CommitmentConfig,
    polling_interval: Duration,
}

impl ConfirmationWatcher {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        commitment: CommitmentConfig,
        polling_interval: Duration,
    ) -> Self {
        Self {
            network,
            commitment,
            polling_interval,
        }
    }

    /// `Ok(true)` once confirmed, `Ok(false)` if it landed with an error,
    /// [`TransferError::ConfirmationTimeout`] if still unknown after `timeout`.
    pub async fn await_confirmation(
        &self,
        signature: &Signature,
        anchor: &RecencyAnchor,
        timeout: Duration,
    ) -> Result<bool, TransferError> {
        Ok(self.watch(signature, anchor, timeout).await? == Confirmation::Landed)
    }

    /// Same as [`Self::await_confirmation`] but keeps the on-chain failure reason
    pub async fn watch(
        &self,
        signature: &Signature,
        anchor: &RecencyAnchor,
        timeout: Duration,
    ) -> Result<Confirmation, TransferError> {
        let timer = Timer::with_name("confirmation_latency_seconds");
        let deadline = Instant::now() + timeout;

        let mut state = match self.probe_status(signature).await {
            ProbeOutcome::Inconclusive => WatchState::Polling(Strategy::BlockingConfirm),
            outcome => next_state(WatchState::Polling(Strategy::SignatureStatus), outcome),
        };

        loop {
            state = match state {
                WatchState::Confirmed => {
                    timer.finish();
                    debug!(signature = %signature, "Transaction confirmed");
                    return Ok(Confirmation::Landed);
                }
                WatchState::Failed(reason) => {
                    timer.finish();
                    warn!(signature = %signature, reason = %reason, "Transaction failed on-chain");
                    return Ok(Confirmation::Failed(reason));
                }
                WatchState::TimedOut => {
                    let result = self.final_check(signature).await;
                    timer.finish();
                    return result;
                }
                WatchState::Polling(strategy) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        WatchState::TimedOut
                    } else {
                        let outcome = self.probe(strategy, signature, anchor, remaining).await;
                        let next = next_state(WatchState::Polling(strategy), outcome);
                        if next == WatchState::Polling(Strategy::BlockingConfirm) {
                            // Cycle exhausted without an answer
                            let remaining = deadline.saturating_duration_since(Instant::now());
                            tokio::time::sleep(self.polling_interval.min(remaining)).await;
                        }
                        next
                    }
                }
            };
        }
    }

    /// One last status read after the deadline before giving up
    async fn final_check(&self, signature: &Signature) -> Result<Confirmation, TransferError> {
        match self.probe_status(signature).await {
            ProbeOutcome::Confirmed => Ok(Confirmation::Landed),
            ProbeOutcome::Failed(reason) => Ok(Confirmation::Failed(reason)),
            ProbeOutcome::Inconclusive => {
                metrics().confirmation_timeouts.inc();
                warn!(signature = %signature, "Confirmation still unknown after deadline");
                Err(TransferError::confirmation_timeout(signature))
            }
        }
    }

    async fn probe(
        &self,
        strategy: Strategy,
        signature: &Signature,
        anchor: &RecencyAnchor,
        remaining: Duration,
    ) -> ProbeOutcome {
        match strategy {
            Strategy::BlockingConfirm => {
                let confirm = self
                    .network
                    .confirm_signature(signature, anchor, self.commitment);
                bounded(remaining, confirm, |result| match result {
                    Ok(None) => ProbeOutcome::Confirmed,
                    Ok(Some(reason)) => ProbeOutcome::Failed(reason),
                    Err(e) => inconclusive(strategy, &e),
                })
                .await
            }
            Strategy::SignatureStatus => {
                bounded(remaining, self.probe_status(signature), |outcome| outcome).await
            }
            Strategy::TransactionLookup => {
                let lookup = self.network.get_transaction_by_signature(signature);
                bounded(remaining, lookup, |result| match result {
                    Ok(Some(tx)) => match tx.err {
                        Some(reason) => ProbeOutcome::Failed(reason),
                        None => ProbeOutcome::Confirmed,
                    },
                    Ok(None) => ProbeOutcome::Inconclusive,
                    Err(e) => inconclusive(strategy, &e),
                })
                .await
            }
        }
    }

    async fn probe_status(&self, signature: &Signature) -> ProbeOutcome {
        match self.network.get_signature_status(signature).await {
            Ok(Some(status)) => {
                if let Some(reason) = status.err {
                    ProbeOutcome::Failed(reason)
                } else if status.is_confirmed() {
                    ProbeOutcome::Confirmed
                } else {
                    ProbeOutcome::Inconclusive
                }
            }
            Ok(None) => ProbeOutcome::Inconclusive,
            Err(e) => inconclusive(Strategy::SignatureStatus, &e),
        }
    }
}

async fn bounded<F, T, M>(remaining: Duration, fut: F, map: M) -> ProbeOutcome
where
    F: Future<Output = T>,
    M: FnOnce(T) -> ProbeOutcome,
{
    match tokio::time::timeout(remaining, fut).await {
        Ok(value) => map(value),
        Err(_) => ProbeOutcome::Inconclusive,
    }
}

fn inconclusive(strategy: Strategy, error: &RpcManagerError) -> ProbeOutcome {
    if error.is_anchor_expiry() {
        debug!(?strategy, "Anchor expired before confirmation");
    } else if error.is_retryable() {
        debug!(?strategy, error = %error, "Transient confirmation error");
    } else {
        warn!(?strategy, error = %error, "Confirmation strategy failed");
    }
    ProbeOutcome::Inconclusive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_manager::{ConfirmationLevel, SignatureStatus, TransactionLookup};
    use crate::test_utils::MockNetwork;
    use solana_sdk::hash::Hash;

    fn anchor() -> RecencyAnchor {
        RecencyAnchor {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 1_000,
        }
    }

    fn status(level: ConfirmationLevel, err: Option<&str>) -> Option<SignatureStatus> {
        Some(SignatureStatus {
            slot: 42,
            err: err.map(str::to_string),
            confirmation: Some(level),
        })
    }

    fn watcher(network: Arc<MockNetwork>) -> ConfirmationWatcher {
        ConfirmationWatcher::new(
            network,
            CommitmentConfig::confirmed(),
            Duration::from_millis(1_000),
        )
    }

    #[test]
    fn test_next_state_cycles_strategies() {
        let start = WatchState::Polling(Strategy::BlockingConfirm);
        let s1 = next_state(start, ProbeOutcome::Inconclusive);
        assert_eq!(s1, WatchState::Polling(Strategy::SignatureStatus));
        let s2 = next_state(s1, ProbeOutcome::Inconclusive);
        assert_eq!(s2, WatchState::Polling(Strategy::TransactionLookup));
        let s3 = next_state(s2, ProbeOutcome::Inconclusive);
        assert_eq!(s3, WatchState::Polling(Strategy::BlockingConfirm));
    }

    #[test]
    fn test_next_state_terminal_states_absorb() {
        let polling = WatchState::Polling(Strategy::SignatureStatus);
        assert_eq!(
            next_state(polling.clone(), ProbeOutcome::Confirmed),
            WatchState::Confirmed
        );
        assert_eq!(
            next_state(polling, ProbeOutcome::Failed("boom".to_string())),
            WatchState::Failed("boom".to_string())
        );
        assert_eq!(
            next_state(WatchState::Confirmed, ProbeOutcome::Failed("late".to_string())),
            WatchState::Confirmed
        );
        assert_eq!(
            next_state(WatchState::TimedOut, ProbeOutcome::Confirmed),
            WatchState::TimedOut
        );
        assert!(WatchState::TimedOut.is_terminal());
        assert!(!WatchState::Polling(Strategy::BlockingConfirm).is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalized_on_first_check_returns_without_waiting() {
        let network = Arc::new(MockNetwork::new());
        network.push_status(status(ConfirmationLevel::Finalized, None));
        let sig = Signature::new_unique();

        let started = Instant::now();
        let confirmed = watcher(network.clone())
            .await_confirmation(&sig, &anchor(), Duration::from_secs(120))
            .await
            .unwrap();

        assert!(confirmed);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(network.confirm_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_onchain_error_on_first_check_is_false() {
        let network = Arc::new(MockNetwork::new());
        network.push_status(status(
            ConfirmationLevel::Confirmed,
            Some("InstructionError(0, Custom(1))"),
        ));

        let confirmed = watcher(network)
            .await_confirmation(&Signature::new_unique(), &anchor(), Duration::from_secs(120))
            .await
            .unwrap();
        assert!(!confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_confirm_success() {
        let network = Arc::new(MockNetwork::new());
        network.push_confirm(Ok(None));

        let confirmed = watcher(network.clone())
            .await_confirmation(&Signature::new_unique(), &anchor(), Duration::from_secs(120))
            .await
            .unwrap();
        assert!(confirmed);
        assert_eq!(network.confirm_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transaction_lookup_after_anchor_expiry() {
        let network = Arc::new(MockNetwork::new());
        // Blocking confirm hits expiry, status still unknown, ledger has it
        network.push_lookup(Ok(Some(TransactionLookup { slot: 7, err: None })));

        let outcome = watcher(network.clone())
            .watch(&Signature::new_unique(), &anchor(), Duration::from_secs(120))
            .await
            .unwrap();
        assert_eq!(outcome, Confirmation::Landed);
        assert_eq!(network.lookup_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_confirm_reports_onchain_error() {
        let network = Arc::new(MockNetwork::new());
        network.push_status(None);
        network.push_confirm(Ok(Some("InstructionError(1, Custom(6))".to_string())));

        let outcome = watcher(network.clone())
            .watch(&Signature::new_unique(), &anchor(), Duration::from_secs(120))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Confirmation::Failed("InstructionError(1, Custom(6))".to_string())
        );
        assert_eq!(network.status_calls(), 1);
        assert_eq!(network.confirm_calls(), 1);
        assert_eq!(network.lookup_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_confirm_error_is_false() {
        let network = Arc::new(MockNetwork::new());
        network.push_status(None);
        network.push_confirm(Ok(Some("InsufficientFundsForFee".to_string())));

        let confirmed = watcher(network)
            .await_confirmation(&Signature::new_unique(), &anchor(), Duration::from_secs(120))
            .await
            .unwrap();
        assert!(!confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transaction_lookup_reports_onchain_error() {
        let network = Arc::new(MockNetwork::new());
        // Entry check and status strategy both unknown, confirm hits expiry
        network.push_status(None);
        network.push_status(None);
        network.push_lookup(Ok(Some(TransactionLookup {
            slot: 9,
            err: Some("InstructionError(0, Custom(1))".to_string()),
        })));

        let started = Instant::now();
        let outcome = watcher(network.clone())
            .watch(&Signature::new_unique(), &anchor(), Duration::from_secs(120))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Confirmation::Failed("InstructionError(0, Custom(1))".to_string())
        );
        assert_eq!(network.confirm_calls(), 1);
        assert_eq!(network.lookup_calls(), 1);
        // Decided within the first cycle
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_errors_are_swallowed() {
        let network = Arc::new(MockNetwork::new());
        network.push_status_error(RpcManagerError::Transport {
            endpoint: "mock".to_string(),
            message: "connection reset".to_string(),
        });
        network.push_status_error(RpcManagerError::Transport {
            endpoint: "mock".to_string(),
            message: "connection reset".to_string(),
        });
        network.push_status(status(ConfirmationLevel::Confirmed, None));

        let confirmed = watcher(network)
            .await_confirmation(&Signature::new_unique(), &anchor(), Duration::from_secs(120))
            .await
            .unwrap();
        assert!(confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_conclusive() {
        let network = Arc::new(MockNetwork::new());
        let sig = Signature::new_unique();

        let started = Instant::now();
        let err = watcher(network.clone())
            .await_confirmation(&sig, &anchor(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err, TransferError::confirmation_timeout(&sig));
        assert!(err.is_retryable());
        assert!(started.elapsed() >= Duration::from_secs(5));
        // Roughly one cycle per polling interval
        assert!(network.confirm_calls() >= 4);
        assert!(network.confirm_calls() <= 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_timeout_check_can_still_confirm() {
        let network = Arc::new(MockNetwork::new());
        // Immediate check unknown, deadline already reached, final check confirmed
        network.push_status(None);
        network.push_status(status(ConfirmationLevel::Confirmed, None));

        let confirmed = watcher(network.clone())
            .await_confirmation(&Signature::new_unique(), &anchor(), Duration::ZERO)
            .await
            .unwrap();
        assert!(confirmed);
        assert_eq!(network.status_calls(), 2);
        assert_eq!(network.confirm_calls(), 0);
    }
}
