/*
[INPUT]:  Mock JSON-RPC and custodial HTTP endpoints
[OUTPUT]: Test results for signer variants and contract-wallet verification
[POS]:    Integration tests - signer layer
[UPDATE]: When signer variants or remote endpoints change
*/

mod common;

use std::sync::Arc;
use std::time::Duration;

use alloy_consensus::{Transaction, TxEnvelope};
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{Address, U256};
use common::{TEST_ADDRESS, setup_mock_server, test_address, test_signer};
use serde_json::json;
use tokio_test::assert_ok;
use walletauth_core::signer::transaction::UnsignedTransaction;
use walletauth_core::{
    AnySigner, ChainRpc, CustodialConfig, CustodialSigner, KmsSigner, LocalSigner, PollPolicy,
    TransactionRequest, WalletAuthError, WalletSigner,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const CONTRACT_WALLET: &str = "0x0000000000000000000000000000000000001271";

/// JSON-RPC result that echoes the request id
struct RpcResult(serde_json::Value);

impl Respond for RpcResult {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "result": self.0,
        }))
    }
}

async fn mount_rpc(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(RpcResult(result))
        .mount(server)
        .await;
}

fn chain_rpc(server: &MockServer) -> Arc<ChainRpc> {
    let mut rpc = ChainRpc::new();
    rpc.connect(1, &server.uri()).unwrap();
    Arc::new(rpc)
}

fn fast_poll() -> PollPolicy {
    PollPolicy {
        initial_interval: Duration::from_millis(10),
        multiplier: 2,
        max_interval: Duration::from_millis(40),
        timeout: Duration::from_millis(500),
    }
}

fn custodial(server: &MockServer) -> CustodialSigner {
    let mut config = CustodialConfig::new(&server.uri(), "access-token", test_address());
    config.chain_id = Some(1);
    config.poll = fast_poll();
    CustodialSigner::new(config).unwrap()
}

#[tokio::test]
async fn test_contract_wallet_fallback_over_rpc() {
    let server = setup_mock_server().await;
    let magic = format!("0x1626ba7e{}", "0".repeat(56));
    mount_rpc(&server, "eth_call", json!(magic)).await;

    let verifier = LocalSigner::random().with_rpc(chain_rpc(&server));
    let signature = assert_ok!(test_signer().sign_message(b"hello").await);
    let contract: Address = CONTRACT_WALLET.parse().unwrap();

    assert!(
        verifier
            .verify_signature(b"hello", &signature, contract, Some(1))
            .await
    );
    assert!(
        !verifier
            .verify_signature(b"hello", &signature, contract, None)
            .await
    );
}

#[tokio::test]
async fn test_contract_wallet_rejects_other_output() {
    let server = setup_mock_server().await;
    mount_rpc(&server, "eth_call", json!(format!("0x{}", "0".repeat(64)))).await;

    let verifier = LocalSigner::random().with_rpc(chain_rpc(&server));
    let signature = assert_ok!(test_signer().sign_message(b"hello").await);
    let contract: Address = CONTRACT_WALLET.parse().unwrap();
    assert!(
        !verifier
            .verify_signature(b"hello", &signature, contract, Some(1))
            .await
    );
}

#[tokio::test]
async fn test_contract_wallet_unknown_chain_is_invalid() {
    let server = setup_mock_server().await;
    let verifier = LocalSigner::random().with_rpc(chain_rpc(&server));
    let signature = assert_ok!(test_signer().sign_message(b"hello").await);
    let contract: Address = CONTRACT_WALLET.parse().unwrap();
    assert!(
        !verifier
            .verify_signature(b"hello", &signature, contract, Some(137))
            .await
    );
}

#[tokio::test]
async fn test_local_send_transaction_fills_fields() {
    let server = setup_mock_server().await;
    mount_rpc(&server, "eth_getTransactionCount", json!("0x5")).await;
    mount_rpc(&server, "eth_estimateGas", json!("0x5208")).await;
    mount_rpc(
        &server,
        "eth_feeHistory",
        json!({
            "oldestBlock": "0x10",
            "baseFeePerGas": ["0x3b9aca00", "0x3b9aca00"],
            "gasUsedRatio": [0.5],
            "reward": [["0x3b9aca00"]],
        }),
    )
    .await;
    let tx_hash = format!("0x{}", "ab".repeat(32));
    mount_rpc(&server, "eth_sendRawTransaction", json!(tx_hash)).await;

    let signer = test_signer().with_rpc(chain_rpc(&server));
    let tx = TransactionRequest {
        to: Some(Address::repeat_byte(0x11)),
        value: Some(U256::from(1_000u64)),
        ..Default::default()
    };

    let hash = assert_ok!(signer.send_transaction(&tx).await);
    assert_eq!(hash, tx_hash);

    let requests = server.received_requests().await.unwrap();
    let broadcast = requests
        .iter()
        .map(|request| serde_json::from_slice::<serde_json::Value>(&request.body).unwrap())
        .find(|body| body["method"] == "eth_sendRawTransaction")
        .unwrap();
    let raw = hex::decode(broadcast["params"][0].as_str().unwrap().trim_start_matches("0x")).unwrap();
    let envelope = TxEnvelope::decode_2718(&mut raw.as_slice()).unwrap();
    assert!(envelope.is_eip1559());
    assert_eq!(envelope.nonce(), 5);
    assert_eq!(envelope.gas_limit(), 21_000);
    assert!(envelope.max_fee_per_gas() >= envelope.max_priority_fee_per_gas().unwrap_or_default());
}

#[tokio::test]
async fn test_local_sign_complete_transaction_offline() {
    let tx = TransactionRequest {
        to: Some(Address::repeat_byte(0x22)),
        gas: Some(U256::from(21_000u64)),
        max_fee_per_gas: Some(U256::from(30_000_000_000u64)),
        max_priority_fee_per_gas: Some(U256::from(1_000_000_000u64)),
        nonce: Some(U256::ZERO),
        ..Default::default()
    };

    let raw = assert_ok!(test_signer().sign_transaction(&tx).await);
    assert!(raw.starts_with("0x02"));

    let incomplete = TransactionRequest {
        to: Some(Address::repeat_byte(0x22)),
        ..Default::default()
    };
    let err = test_signer().sign_transaction(&incomplete).await.unwrap_err();
    assert!(matches!(err, WalletAuthError::InvalidPayload(_)));
}

#[tokio::test]
async fn test_kms_signer_matches_local_signer() {
    let local = test_signer();
    let kms = KmsSigner::new(Arc::new(local.inner().clone())).with_chain_id(1);
    assert_eq!(kms.address(), test_address());

    let signature = assert_ok!(kms.sign_message(b"digest backed").await);
    assert!(
        kms.verify_signature(b"digest backed", &signature, test_address(), None)
            .await
    );

    let tx = TransactionRequest {
        to: Some(Address::repeat_byte(0x33)),
        gas: Some(U256::from(21_000u64)),
        gas_price: Some(U256::from(1_000_000_000u64)),
        nonce: Some(U256::from(7u64)),
        ..Default::default()
    };
    assert_eq!(
        assert_ok!(kms.sign_transaction(&tx).await),
        assert_ok!(local.sign_transaction(&tx).await)
    );

    let unsigned = assert_ok!(UnsignedTransaction::from_request(&tx, 1));
    assert!(matches!(unsigned, UnsignedTransaction::Legacy(_)));
}

#[tokio::test]
async fn test_custodial_sign_message() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/backend-wallet/sign-message"))
        .and(header("authorization", "Bearer access-token"))
        .and(header("x-backend-wallet-address", TEST_ADDRESS))
        .and(body_partial_json(json!({"message": "hello", "isBytes": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "0xsigned"})))
        .expect(1)
        .mount(&server)
        .await;

    let signer = AnySigner::from(custodial(&server));
    assert_eq!(signer.kind(), "custodial");
    assert_eq!(assert_ok!(signer.sign_message(b"hello").await), "0xsigned");
}

#[tokio::test]
async fn test_custodial_binary_message_sent_as_hex() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/backend-wallet/sign-message"))
        .and(body_partial_json(json!({"message": "0xff00", "isBytes": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "0xsigned"})))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(custodial(&server).sign_message(&[0xff, 0x00]).await);
}

#[tokio::test]
async fn test_custodial_send_transaction_polls_until_mined() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/backend-wallet/1/send-transaction"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"queueId": "q-1"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transaction/status/q-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"status": "queued"}})),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transaction/status/q-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"status": "mined", "transactionHash": "0xhash"}
        })))
        .mount(&server)
        .await;

    let tx = TransactionRequest {
        to: Some(Address::repeat_byte(0x44)),
        ..Default::default()
    };
    assert_eq!(
        assert_ok!(custodial(&server).send_transaction(&tx).await),
        "0xhash"
    );
}

#[tokio::test]
async fn test_custodial_errored_job() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/backend-wallet/1/send-transaction"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"queueId": "q-2"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transaction/status/q-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"status": "errored", "errorMessage": "insufficient funds"}
        })))
        .mount(&server)
        .await;

    let err = custodial(&server)
        .send_transaction(&TransactionRequest::default())
        .await
        .unwrap_err();
    match err {
        WalletAuthError::TransactionFailed {
            queue_id, message, ..
        } => {
            assert_eq!(queue_id, "q-2");
            assert_eq!(message, "insufficient funds");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_custodial_poll_times_out() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/backend-wallet/1/send-transaction"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"queueId": "q-3"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transaction/status/q-3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"status": "sent"}})),
        )
        .mount(&server)
        .await;

    let err = custodial(&server)
        .send_transaction(&TransactionRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WalletAuthError::Timeout { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_custodial_http_error_surfaces() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/backend-wallet/sign-message"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = custodial(&server).sign_message(b"x").await.unwrap_err();
    assert!(matches!(err, WalletAuthError::InvalidResponse(_)));
}
