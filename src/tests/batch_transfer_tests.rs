//! End-to-end batch transfer scenarios against scripted network and signer doubles
//!
//! Covers batching, per-batch isolation of failures, retry exhaustion and
//! request-level aborts.

#[cfg(test)]
mod batch_transfer_tests {
    use solana_sdk::pubkey::Pubkey;
    use spl_associated_token_account::get_associated_token_address_with_program_id;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::{Config, MAX_TOKEN_BATCH_SIZE};
    use crate::errors::TransferError;
    use crate::orchestrator::BatchOrchestrator;
    use crate::rpc_manager::RpcManagerError;
    use crate::signer::{SignerFailure, SignerGateway, SignerProvider};
    use crate::test_utils::{recipients, Landing, MockNetwork, MockSignerProvider, SignerScript};
    use crate::types::{TransferRequest, TransferStatus, TransferSummary};

    fn config() -> Config {
        let mut config = Config::default();
        config.fee.destination = Pubkey::new_from_array([9u8; 32]).to_string();
        config.fee.amount = "0.001".to_string();
        config
    }

    fn orchestrator(
        network: &Arc<MockNetwork>,
        provider: &Arc<MockSignerProvider>,
        config: &Config,
    ) -> BatchOrchestrator {
        let providers = vec![Arc::clone(provider) as Arc<dyn SignerProvider>];
        let gateway = SignerGateway::new(providers, Duration::from_secs(5));
        BatchOrchestrator::new(network.clone(), gateway, config).unwrap()
    }

    fn native_request(n: usize) -> TransferRequest {
        TransferRequest::native(recipients(n), "0.01".parse().unwrap())
    }

    fn transport_error() -> RpcManagerError {
        RpcManagerError::Transport {
            endpoint: "mock".to_string(),
            message: "connection refused".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_twenty_recipients_in_three_ordered_batches() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        let request = native_request(20);

        let results = orchestrator(&network, &provider, &config())
            .transfer(&request)
            .await
            .unwrap();

        let sizes: Vec<usize> = results.iter().map(|r| r.recipients.len()).collect();
        assert_eq!(sizes, vec![9, 9, 2]);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.batch_index, i);
            assert_eq!(result.status, TransferStatus::Success);
            assert_eq!(result.attempts, 1);
        }

        let flattened: Vec<String> = results.iter().flat_map(|r| r.recipients.clone()).collect();
        assert_eq!(flattened, request.recipients);

        let sent: Vec<String> = network
            .sent_signatures()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let reported: Vec<String> = results.iter().map(|r| r.signature.clone()).collect();
        assert_eq!(sent, reported);
        // One anchor per attempt
        assert_eq!(network.anchor_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_rejection_on_middle_batch_is_isolated() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        provider.push(SignerScript::Sign);
        provider.push(SignerScript::Fail(SignerFailure::UserRejected));

        let results = orchestrator(&network, &provider, &config())
            .transfer(&native_request(27))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert_eq!(results[1].status, TransferStatus::Error);
        assert_eq!(results[1].attempts, 1);
        assert_eq!(results[1].signature, "");
        assert!(results[1]
            .error_message
            .as_deref()
            .unwrap()
            .contains("rejected"));
        assert!(results[2].is_success());
        assert_eq!(provider.sign_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_submissions_do_not_stop_next_batch() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        let config = config();
        for _ in 0..config.transfer.max_retries {
            network.fail_next_send(transport_error());
        }

        let results = orchestrator(&network, &provider, &config)
            .transfer(&native_request(18))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, TransferStatus::Error);
        assert_eq!(results[0].attempts, config.transfer.max_retries);
        assert!(results[0]
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Submission failed"));
        assert!(results[1].is_success());
        assert_eq!(results[1].attempts, 1);

        // Every attempt rebuilt against a fresh anchor
        assert_eq!(network.anchor_calls(), 4);
        assert_eq!(network.sent_configs().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_retries_with_new_envelope() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        let mut config = config();
        config.transfer.confirmation_timeout_ms = 3_000;
        network.push_landing(Landing::Drop);

        let results = orchestrator(&network, &provider, &config)
            .transfer(&native_request(5))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 2);

        let sent = network.sent_signatures();
        assert_eq!(sent.len(), 2);
        assert_ne!(sent[0], sent[1]);
        assert_eq!(results[0].signature, sent[1].to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_onchain_failure_is_retried() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        network.push_landing(Landing::FailOnChain("InstructionError(1, Custom(1))".to_string()));

        let results = orchestrator(&network, &provider, &config())
            .transfer(&native_request(3))
            .await
            .unwrap();

        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_time_out() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        let mut config = config();
        config.transfer.confirmation_timeout_ms = 2_000;
        config.transfer.max_retries = 2;
        network.push_landing(Landing::Drop);
        network.push_landing(Landing::Drop);

        let results = orchestrator(&network, &provider, &config)
            .transfer(&native_request(2))
            .await
            .unwrap();

        let result = &results[0];
        assert_eq!(result.status, TransferStatus::Error);
        assert_eq!(result.attempts, 2);
        // Last signature seen is still reported
        assert_eq!(result.signature, network.sent_signatures()[1].to_string());
        assert!(result
            .error_message
            .as_deref()
            .unwrap()
            .contains("may still land"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signer_disconnect_mid_request_fails_remaining_batches() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        provider.push(SignerScript::SignAndDisconnect);

        let results = orchestrator(&network, &provider, &config())
            .transfer(&native_request(20))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        for result in &results[1..] {
            assert_eq!(result.status, TransferStatus::Error);
            assert_eq!(result.attempts, 1);
        }

        let summary = TransferSummary::from_results(&results);
        assert_eq!(summary.batches_succeeded, 1);
        assert_eq!(summary.recipients_paid, 9);
        assert_eq!(summary.recipients_unpaid, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_batches_only() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        let config = config();

        let started = tokio::time::Instant::now();
        orchestrator(&network, &provider, &config)
            .transfer(&native_request(20))
            .await
            .unwrap();

        let pacing = Duration::from_millis(config.transfer.batch_delay_ms);
        let elapsed = started.elapsed();
        assert!(elapsed >= pacing * 2);
        assert!(elapsed < pacing * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_transfer_creates_missing_accounts() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        network.set_decimals(6);
        let mint = Pubkey::new_unique();
        let list = recipients(4);
        let funded: Pubkey = list[0].parse().unwrap();
        network.add_account(get_associated_token_address_with_program_id(
            &funded,
            &mint,
            &spl_token::id(),
        ));

        let request = TransferRequest::token(list, "1.5".parse().unwrap(), mint);
        let results = orchestrator(&network, &provider, &config())
            .transfer(&request)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
        assert_eq!(network.decimals_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_fee_aborts_before_any_network_activity() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        let mut config = config();
        config.fee.amount = "not-a-number".to_string();

        let err = orchestrator(&network, &provider, &config)
            .transfer(&native_request(20))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::FatalConfig(_)));
        assert_eq!(network.anchor_calls(), 0);
        assert_eq!(provider.sign_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_preconditions() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        let orchestrator = orchestrator(&network, &provider, &config());

        let empty = orchestrator.transfer(&native_request(0)).await.unwrap_err();
        assert!(matches!(empty, TransferError::Validation(_)));

        let dust = TransferRequest::native(recipients(2), "0.0000000001".parse().unwrap());
        let err = orchestrator.transfer(&dust).await.unwrap_err();
        assert!(matches!(err, TransferError::Validation(_)));

        provider.set_connected(false);
        let err = orchestrator.transfer(&native_request(2)).await.unwrap_err();
        assert_eq!(err, TransferError::NoSignerAvailable);

        assert_eq!(network.anchor_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_batches_over_packet_capacity_are_rejected() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        let mut config = config();
        config.transfer.batch_size = MAX_TOKEN_BATCH_SIZE + 1;
        let orchestrator = orchestrator(&network, &provider, &config);

        let mint = Pubkey::new_unique();
        let request = TransferRequest::token(recipients(12), "1".parse().unwrap(), mint);
        let err = orchestrator.transfer(&request).await.unwrap_err();
        assert!(matches!(err, TransferError::Validation(_)));
        assert_eq!(network.anchor_calls(), 0);
        assert_eq!(provider.sign_calls(), 0);

        // Native batches of the same size still fit
        let results = orchestrator.transfer(&native_request(12)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_success()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_signer_is_rejected_up_front() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("legacy").without_batch_sign());

        let err = orchestrator(&network, &provider, &config())
            .transfer(&native_request(3))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::UnsupportedSigner("legacy".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_anchor_failure_is_retried() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        network.fail_next_anchor(RpcManagerError::Timeout {
            endpoint: "mock".to_string(),
            timeout_ms: 30_000,
        });

        let results = orchestrator(&network, &provider, &config())
            .transfer(&native_request(3))
            .await
            .unwrap();
        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_rpc_error_during_build_is_retried() {
        let network = Arc::new(MockNetwork::new());
        let provider = Arc::new(MockSignerProvider::new("wallet"));
        network.fail_next_anchor(RpcManagerError::InsufficientFunds {
            endpoint: "mock".to_string(),
        });

        let results = orchestrator(&network, &provider, &config())
            .transfer(&native_request(3))
            .await
            .unwrap();
        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 2);
        assert_eq!(network.anchor_calls(), 2);
    }
}
