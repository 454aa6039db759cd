/*
[INPUT]:  Deterministic signers and login options
[OUTPUT]: Test results for login payload build, sign and verify
[POS]:    Integration tests - login protocol
[UPDATE]: When login message layout or verification order changes
*/

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{TEST_ADDRESS, TEST_DOMAIN, test_address, test_signer};
use rstest::rstest;
use tokio_test::assert_ok;
use walletauth_core::auth::{self, FnValidator, UsedNonces};
use walletauth_core::{
    AccountType, LoginOptions, LoginPayload, MockWalletSigner, VerifyOptions, WalletAuthError,
    WalletSigner,
};
use walletauth_core::signer::MockContractReader;

async fn signed_payload(options: &LoginOptions) -> LoginPayload {
    assert_ok!(auth::login::login(&test_signer(), options).await)
}

#[tokio::test]
async fn test_login_round_trip_returns_lowercase_address() {
    let mut options = LoginOptions::new(TEST_DOMAIN);
    options.expiration_time = Some(Utc::now() + Duration::seconds(600));
    let payload = signed_payload(&options).await;

    assert_eq!(payload.payload.address, TEST_ADDRESS);
    assert_eq!(payload.payload.chain_id.as_deref(), Some("1"));

    let address = assert_ok!(
        auth::verify(&test_signer(), &payload, &VerifyOptions::new(TEST_DOMAIN)).await
    );
    assert_eq!(address, TEST_ADDRESS.to_lowercase());
}

#[tokio::test]
async fn test_domain_binding() {
    let payload = signed_payload(&LoginOptions::new(TEST_DOMAIN)).await;
    let err = auth::verify(&test_signer(), &payload, &VerifyOptions::new("other.example"))
        .await
        .unwrap_err();

    match err {
        WalletAuthError::DomainMismatch { expected, found } => {
            assert_eq!(expected, "other.example");
            assert_eq!(found, TEST_DOMAIN);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_verifier_signer_need_not_be_the_payload_signer() {
    let payload = signed_payload(&LoginOptions::new(TEST_DOMAIN)).await;
    let verifier = walletauth_core::LocalSigner::random();
    assert_ok!(auth::verify(&verifier, &payload, &VerifyOptions::new(TEST_DOMAIN)).await);
}

#[rstest]
#[case::statement("statement")]
#[case::uri("uri")]
#[case::version("version")]
#[case::chain_id("chain_id")]
#[case::account_type("account_type")]
#[tokio::test]
async fn test_field_mismatch_rejected(#[case] field: &str) {
    let mut options = LoginOptions::new(TEST_DOMAIN);
    options.uri = Some("https://app.example/login".into());
    let payload = signed_payload(&options).await;

    let mut verify = VerifyOptions::new(TEST_DOMAIN);
    match field {
        "statement" => verify.statement = Some("Another statement".into()),
        "uri" => verify.uri = Some("https://evil.example".into()),
        "version" => verify.version = Some("2".into()),
        "chain_id" => verify.chain_id = Some("137".into()),
        _ => verify.account_type = AccountType::Solana,
    }

    let err = auth::verify(&test_signer(), &payload, &verify).await.unwrap_err();
    let matched = match field {
        "statement" => matches!(err, WalletAuthError::StatementMismatch { .. }),
        "uri" => matches!(err, WalletAuthError::UriMismatch { .. }),
        "version" => matches!(err, WalletAuthError::VersionMismatch { .. }),
        "chain_id" => matches!(err, WalletAuthError::ChainIdMismatch { .. }),
        _ => matches!(err, WalletAuthError::AccountTypeMismatch { .. }),
    };
    assert!(matched, "{field}: unexpected error {err}");
}

#[tokio::test]
async fn test_expired_login_rejected() {
    let payload = signed_payload(&LoginOptions::new(TEST_DOMAIN)).await;
    let mut expired = payload.clone();
    expired.payload.invalid_before = walletauth_core::format_timestamp(Utc::now() - Duration::hours(2));
    expired.payload.expiration_time =
        walletauth_core::format_timestamp(Utc::now() - Duration::hours(1));

    let err = auth::verify(&test_signer(), &expired, &VerifyOptions::new(TEST_DOMAIN))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletAuthError::LoginExpired));
}

#[tokio::test]
async fn test_not_yet_valid_login_rejected() {
    let payload = signed_payload(&LoginOptions::new(TEST_DOMAIN)).await;
    let mut early = payload.clone();
    early.payload.invalid_before = walletauth_core::format_timestamp(Utc::now() + Duration::hours(1));
    early.payload.expiration_time =
        walletauth_core::format_timestamp(Utc::now() + Duration::hours(2));

    let err = auth::verify(&test_signer(), &early, &VerifyOptions::new(TEST_DOMAIN))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletAuthError::LoginNotYetValid));
}

#[tokio::test]
async fn test_build_rejects_inverted_window() {
    let mut options = LoginOptions::new(TEST_DOMAIN);
    options.invalid_before = Some(Utc::now() - Duration::minutes(1));
    options.expiration_time = Some(Utc::now() - Duration::minutes(2));
    let err = auth::build(&test_signer(), &options).await.unwrap_err();
    assert!(matches!(err, WalletAuthError::InvalidPayload(_)));

    let mut future = LoginOptions::new(TEST_DOMAIN);
    future.invalid_before = Some(Utc::now() + Duration::hours(1));
    assert!(auth::build(&test_signer(), &future).await.is_err());
}

#[tokio::test]
async fn test_missing_resources_listed() {
    let mut options = LoginOptions::new(TEST_DOMAIN);
    options.resources = Some(vec!["https://app.example/a".into()]);
    let payload = signed_payload(&options).await;

    let mut verify = VerifyOptions::new(TEST_DOMAIN);
    verify.resources = Some(vec![
        "https://app.example/a".into(),
        "https://app.example/b".into(),
    ]);
    let err = auth::verify(&test_signer(), &payload, &verify).await.unwrap_err();
    match err {
        WalletAuthError::MissingResources(missing) => {
            assert_eq!(missing, vec!["https://app.example/b".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_nonce_replay_rejected() {
    let payload = signed_payload(&LoginOptions::new(TEST_DOMAIN)).await;
    let verify = VerifyOptions::new(TEST_DOMAIN).with_nonce_validator(Arc::new(UsedNonces::new()));

    assert_ok!(auth::verify(&test_signer(), &payload, &verify).await);
    let err = auth::verify(&test_signer(), &payload, &verify).await.unwrap_err();
    assert!(matches!(err, WalletAuthError::InvalidNonce));
}

#[tokio::test]
async fn test_failed_signature_keeps_nonce_available() {
    let payload = signed_payload(&LoginOptions::new(TEST_DOMAIN)).await;
    let nonces = Arc::new(UsedNonces::new());
    let verify = VerifyOptions::new(TEST_DOMAIN).with_nonce_validator(nonces.clone());

    let mut tampered = payload.clone();
    tampered.payload.statement = "Sign in to something else".into();
    let err = auth::verify(&test_signer(), &tampered, &verify).await.unwrap_err();
    assert!(matches!(err, WalletAuthError::SignatureMismatch(_)));
    assert!(nonces.is_empty().await);

    assert_ok!(auth::verify(&test_signer(), &payload, &verify).await);
    assert_eq!(nonces.len().await, 1);
}

#[tokio::test]
async fn test_nonce_validator_runs_before_time_checks() {
    let payload = signed_payload(&LoginOptions::new(TEST_DOMAIN)).await;
    let mut expired = payload.clone();
    expired.payload.expiration_time =
        walletauth_core::format_timestamp(Utc::now() - Duration::hours(1));

    let validator = FnValidator::new(|_nonce: String| async move {
        Err::<(), auth::BoxError>("nonce store unavailable".into())
    });
    let verify = VerifyOptions::new(TEST_DOMAIN).with_nonce_validator(Arc::new(validator));
    let err = auth::verify(&test_signer(), &expired, &verify).await.unwrap_err();
    assert!(matches!(err, WalletAuthError::InvalidNonce));
}

#[tokio::test]
async fn test_payload_tamper_rejected() {
    let payload = signed_payload(&LoginOptions::new(TEST_DOMAIN)).await;

    let mut tampered = payload.clone();
    tampered.payload.nonce.push('0');
    let err = auth::verify(&test_signer(), &tampered, &VerifyOptions::new(TEST_DOMAIN))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletAuthError::SignatureMismatch(_)));
}

#[tokio::test]
async fn test_signature_tamper_rejected() {
    let payload = signed_payload(&LoginOptions::new(TEST_DOMAIN)).await;
    let body = payload.signature.trim_start_matches("0x");

    for index in [0, 40, 100, body.len() - 2] {
        let mut bytes = hex::decode(body).unwrap();
        bytes[index / 2] ^= 0x01;
        let mut tampered = payload.clone();
        tampered.signature = format!("0x{}", hex::encode(bytes));

        let result = auth::verify(&test_signer(), &tampered, &VerifyOptions::new(TEST_DOMAIN)).await;
        assert!(result.is_err(), "flipped byte {} still verified", index / 2);
    }
}

#[tokio::test]
async fn test_contract_wallet_login() {
    let contract: alloy_primitives::Address =
        "0x0000000000000000000000000000000000001271".parse().unwrap();
    let wallet = MockWalletSigner::new(contract, &assert_ok!(test_signer().sign_message(b"x").await))
        .with_chain_id(1)
        .with_contract_reader(MockContractReader::accepting());

    let payload = assert_ok!(auth::login::login(&wallet, &LoginOptions::new(TEST_DOMAIN)).await);
    let address = assert_ok!(
        auth::verify(&wallet, &payload, &VerifyOptions::new(TEST_DOMAIN)).await
    );
    assert_eq!(address, "0x0000000000000000000000000000000000001271");
}

#[tokio::test]
async fn test_parse_login_message_matches_payload() {
    let mut options = LoginOptions::new(TEST_DOMAIN);
    options.uri = Some("https://app.example".into());
    options.resources = Some(vec!["ipfs://one".into(), "https://two.example".into()]);
    let payload = signed_payload(&options).await;

    let message = auth::create_login_message(&payload.payload);
    let parsed = assert_ok!(auth::parse_login_message(&message));
    assert_eq!(parsed.address, test_address().to_checksum(None));
    assert_eq!(auth::create_login_message(&parsed), message);
}

#[tokio::test]
async fn test_second_precision_timestamps_verify() {
    let now = Utc::now();
    let seconds = |time: chrono::DateTime<Utc>| time.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let message = format!(
        "{TEST_DOMAIN} wants you to sign in with your Ethereum account:\n\
         {TEST_ADDRESS}\n\
         \n\
         Sign in to the example app.\n\
         \n\
         Version: 1\n\
         Chain ID: 1\n\
         Nonce: external-1\n\
         Issued At: {}\n\
         Expiration Time: {}\n\
         Not Before: {}",
        seconds(now - Duration::seconds(5)),
        seconds(now + Duration::seconds(600)),
        seconds(now - Duration::seconds(5)),
    );
    assert!(!message.contains(".000Z"));

    let signature = assert_ok!(test_signer().sign_message(message.as_bytes()).await);
    let payload = LoginPayload {
        payload: assert_ok!(auth::parse_login_message(&message)),
        signature,
    };
    assert_eq!(auth::create_login_message(&payload.payload), message);

    let address = assert_ok!(
        auth::verify(&test_signer(), &payload, &VerifyOptions::new(TEST_DOMAIN)).await
    );
    assert_eq!(address, TEST_ADDRESS.to_lowercase());
}
