//! Test Utilities Module
//!
//! Scripted doubles for the network and signer seams, used to drive the
//! transfer pipeline deterministically without a cluster or wallet.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use solana_rpc_client_api::config::RpcSendTransactionConfig;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::VersionedTransaction,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::rpc_manager::{
    ConfirmationLevel, NetworkClient, RpcManagerError, SignatureStatus, TransactionLookup,
};
use crate::signer::{SignerFailure, SignerProvider};
use crate::tx_builder::compile_with_anchor;
use crate::types::{RecencyAnchor, TransactionEnvelope};

const MOCK_ENDPOINT: &str = "mock";

/// What happens on-chain to a transaction the mock accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Landing {
    /// Shows up as finalized on the next status read
    Finalize,
    /// Accepted but never lands
    Drop,
    /// Lands with an execution error
    FailOnChain(String),
}

#[derive(Default)]
struct NetworkState {
    decimals: u8,
    accounts: HashSet<Pubkey>,
    anchor_failures: VecDeque<RpcManagerError>,
    send_failures: VecDeque<RpcManagerError>,
    sticky_send_failure: Option<RpcManagerError>,
    landings: VecDeque<Landing>,
    landed: HashMap<Signature, Landing>,
    sent_configs: Vec<RpcSendTransactionConfig>,
    sent_signatures: Vec<Signature>,
    status_script: VecDeque<Result<Option<SignatureStatus>, RpcManagerError>>,
    confirm_script: VecDeque<Result<Option<String>, RpcManagerError>>,
    lookup_script: VecDeque<Result<Option<TransactionLookup>, RpcManagerError>>,
}

/// Scripted in-memory [`NetworkClient`]
///
/// By default every accepted transaction is reported finalized by the
/// status lookup, the blocking confirm reports anchor expiry and the
/// transaction lookup finds nothing. Scripted entries take precedence.
#[derive(Default)]
pub struct MockNetwork {
    state: Mutex<NetworkState>,
    anchor_calls: AtomicUsize,
    decimals_calls: AtomicUsize,
    status_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl MockNetwork {
    pub fn new() -> Self {
        let network = Self::default();
        network.set_decimals(9);
        network
    }

    fn state(&self) -> std::sync::MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_decimals(&self, decimals: u8) {
        self.state().decimals = decimals;
    }

    /// Mark an account as existing
    pub fn add_account(&self, address: Pubkey) {
        self.state().accounts.insert(address);
    }

    pub fn fail_next_anchor(&self, error: RpcManagerError) {
        self.state().anchor_failures.push_back(error);
    }

    pub fn fail_next_send(&self, error: RpcManagerError) {
        self.state().send_failures.push_back(error);
    }

    /// Reject every send from now on
    pub fn fail_all_sends(&self, error: RpcManagerError) {
        self.state().sticky_send_failure = Some(error);
    }

    /// Fate of the next accepted transaction
    pub fn push_landing(&self, landing: Landing) {
        self.state().landings.push_back(landing);
    }

    pub fn push_status(&self, status: Option<SignatureStatus>) {
        self.state().status_script.push_back(Ok(status));
    }

    pub fn push_status_error(&self, error: RpcManagerError) {
        self.state().status_script.push_back(Err(error));
    }

    pub fn push_confirm(&self, result: Result<Option<String>, RpcManagerError>) {
        self.state().confirm_script.push_back(result);
    }

    pub fn push_lookup(&self, result: Result<Option<TransactionLookup>, RpcManagerError>) {
        self.state().lookup_script.push_back(result);
    }

    pub fn sent_configs(&self) -> Vec<RpcSendTransactionConfig> {
        self.state().sent_configs.clone()
    }

    pub fn sent_signatures(&self) -> Vec<Signature> {
        self.state().sent_signatures.clone()
    }

    pub fn anchor_calls(&self) -> usize {
        self.anchor_calls.load(Ordering::SeqCst)
    }

    pub fn decimals_calls(&self) -> usize {
        self.decimals_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkClient for MockNetwork {
    async fn get_latest_anchor(
        &self,
        _commitment: CommitmentConfig,
    ) -> Result<RecencyAnchor, RpcManagerError> {
        self.anchor_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.state().anchor_failures.pop_front() {
            return Err(error);
        }
        Ok(RecencyAnchor {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 300,
        })
    }

    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, RpcManagerError> {
        Ok(self
            .state()
            .accounts
            .contains(address)
            .then(Account::default))
    }

    async fn get_asset_decimals(&self, _mint: &Pubkey) -> Result<u8, RpcManagerError> {
        self.decimals_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state().decimals)
    }

    async fn send_signed_envelope(
        &self,
        transaction: &VersionedTransaction,
        config: RpcSendTransactionConfig,
    ) -> Result<Signature, RpcManagerError> {
        let mut state = self.state();
        state.sent_configs.push(config);

        if let Some(error) = state.send_failures.pop_front() {
            return Err(error);
        }
        if let Some(error) = state.sticky_send_failure.clone() {
            return Err(error);
        }

        let signature = transaction.signatures.first().copied().ok_or_else(|| {
            RpcManagerError::Internal("transaction carries no signature".to_string())
        })?;
        let landing = state.landings.pop_front().unwrap_or(Landing::Finalize);
        state.landed.insert(signature, landing);
        state.sent_signatures.push(signature);
        Ok(signature)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcManagerError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(scripted) = state.status_script.pop_front() {
            return scripted;
        }
        Ok(match state.landed.get(signature) {
            Some(Landing::Finalize) => Some(SignatureStatus {
                slot: 1,
                err: None,
                confirmation: Some(ConfirmationLevel::Finalized),
            }),
            Some(Landing::FailOnChain(reason)) => Some(SignatureStatus {
                slot: 1,
                err: Some(reason.clone()),
                confirmation: Some(ConfirmationLevel::Confirmed),
            }),
            Some(Landing::Drop) | None => None,
        })
    }

    async fn confirm_signature(
        &self,
        _signature: &Signature,
        _anchor: &RecencyAnchor,
        _commitment: CommitmentConfig,
    ) -> Result<Option<String>, RpcManagerError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.state().confirm_script.pop_front().unwrap_or_else(|| {
            Err(RpcManagerError::TransactionExpired {
                endpoint: MOCK_ENDPOINT.to_string(),
            })
        })
    }

    async fn get_transaction_by_signature(
        &self,
        _signature: &Signature,
    ) -> Result<Option<TransactionLookup>, RpcManagerError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.state().lookup_script.pop_front().unwrap_or(Ok(None))
    }
}

/// Scripted behaviour for one `sign_all` call
#[derive(Debug, Clone)]
pub enum SignerScript {
    Sign,
    Fail(SignerFailure),
    /// Never answers
    Hang,
    /// Hands the transaction back with placeholder signatures
    ReturnUnsigned,
    /// Signs, then reports itself disconnected
    SignAndDisconnect,
}

/// Keypair-backed [`SignerProvider`] with scripted failures
pub struct MockSignerProvider {
    name: String,
    keypair: Keypair,
    connected: AtomicBool,
    batch_sign: bool,
    script: Mutex<VecDeque<SignerScript>>,
    sign_calls: AtomicUsize,
}

impl MockSignerProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keypair: Keypair::new(),
            connected: AtomicBool::new(true),
            batch_sign: true,
            script: Mutex::new(VecDeque::new()),
            sign_calls: AtomicUsize::new(0),
        }
    }

    pub fn disconnected(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    pub fn without_batch_sign(mut self) -> Self {
        self.batch_sign = false;
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Queue the behaviour of the next `sign_all` call; unscripted calls sign
    pub fn push(&self, step: SignerScript) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(step);
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    fn sign(&self, transactions: Vec<VersionedTransaction>) -> Result<Vec<VersionedTransaction>, SignerFailure> {
        transactions
            .into_iter()
            .map(|tx| {
                VersionedTransaction::try_new(tx.message, &[&self.keypair])
                    .map_err(|e| SignerFailure::Other(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl SignerProvider for MockSignerProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn supports_batch_sign(&self) -> bool {
        self.batch_sign
    }

    async fn sign_all(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, SignerFailure> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(SignerScript::Sign);

        match step {
            SignerScript::Sign => self.sign(transactions),
            SignerScript::Fail(failure) => Err(failure),
            SignerScript::Hang => std::future::pending().await,
            SignerScript::ReturnUnsigned => Ok(transactions),
            SignerScript::SignAndDisconnect => {
                let signed = self.sign(transactions);
                self.set_connected(false);
                signed
            }
        }
    }
}

/// Unsigned single-transfer envelope paid by `payer`
pub fn sample_envelope(payer: &Pubkey) -> TransactionEnvelope {
    #[allow(deprecated)]
    let transfer = system_instruction::transfer(payer, &Pubkey::new_unique(), 1_000);
    let anchor = RecencyAnchor {
        blockhash: Hash::new_unique(),
        last_valid_block_height: 300,
    };
    compile_with_anchor(&[transfer], payer, anchor).expect("sample envelope compiles")
}

/// `n` distinct valid recipient addresses
pub fn recipients(n: usize) -> Vec<String> {
    (0..n).map(|_| Pubkey::new_unique().to_string()).collect()
}
