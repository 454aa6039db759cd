/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for walletauth-core tests

#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::Address;
use walletauth_core::LocalSigner;
use wiremock::MockServer;

/// Well-known development key
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address derived from `TEST_PRIVATE_KEY` and `TEST_MNEMONIC`
pub const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

pub const TEST_DOMAIN: &str = "app.example";

/// Web3 Secret Storage PBKDF2 test vector, password `testpassword`
pub const V3_KEYSTORE: &str = r#"{
    "crypto": {
        "cipher": "aes-128-ctr",
        "cipherparams": {"iv": "6087dab2f9fdbbfaddc31a909735c1e6"},
        "ciphertext": "5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46",
        "kdf": "pbkdf2",
        "kdfparams": {
            "c": 262144,
            "dklen": 32,
            "prf": "hmac-sha256",
            "salt": "ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"
        },
        "mac": "517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9e51205e9b2"
    },
    "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
    "version": 3
}"#;

/// Private key inside `V3_KEYSTORE`
pub const V3_KEYSTORE_KEY: &str =
    "0x7a28b5ba57c53603b0b07b56bba752f7784bf506fa95edc395f5cf6c7514fe9d";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_address() -> Address {
    TEST_ADDRESS.parse().unwrap()
}

/// Deterministic local signer on chain 1
pub fn test_signer() -> LocalSigner {
    LocalSigner::from_private_key(TEST_PRIVATE_KEY)
        .unwrap()
        .with_chain_id(1)
}

pub fn shared_signer() -> Arc<LocalSigner> {
    Arc::new(test_signer())
}

/// Flip one character inside a base64 segment
pub fn tamper_segment(segment: &str) -> String {
    let mut chars: Vec<char> = segment.chars().collect();
    let index = chars.len() / 2;
    chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
    chars.into_iter().collect()
}
