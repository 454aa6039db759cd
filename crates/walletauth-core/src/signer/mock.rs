/*
[INPUT]:  Predetermined addresses, signatures and contract responses
[OUTPUT]: Test doubles for the signer and contract-reader contracts
[POS]:    Signer layer - mocks for tests and examples
[UPDATE]: When the WalletSigner or ContractReader contracts change
*/

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

use crate::error::{Result, WalletAuthError};
use crate::rpc::ContractReader;
use crate::signer::WalletSigner;
use crate::signer::verify::EIP1271_MAGIC_VALUE;

/// Mock wallet signer for testing
///
/// Always returns the same signature. Verification goes through the regular
/// two-tier path, using the attached contract reader if any.
pub struct MockWalletSigner {
    address: Address,
    signature: String,
    chain_id: Option<u64>,
    reader: Option<MockContractReader>,
}

impl MockWalletSigner {
    /// Create a new mock signer with predetermined signature
    pub fn new(address: Address, signature: &str) -> Self {
        Self {
            address,
            signature: signature.to_string(),
            chain_id: None,
            reader: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_contract_reader(mut self, reader: MockContractReader) -> Self {
        self.reader = Some(reader);
        self
    }
}

#[async_trait]
impl WalletSigner for MockWalletSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn sign_message(&self, _message: &[u8]) -> Result<String> {
        Ok(self.signature.clone())
    }

    fn contract_reader(&self) -> Option<&dyn ContractReader> {
        self.reader.as_ref().map(|r| r as &dyn ContractReader)
    }
}

#[derive(Debug, Clone)]
enum MockResponse {
    Output(Bytes),
    Fail(String),
}

/// Contract reader answering every call with a fixed response
#[derive(Debug)]
pub struct MockContractReader {
    response: MockResponse,
    calls: AtomicUsize,
    last_call: Mutex<Option<(u64, Address, Bytes)>>,
}

impl MockContractReader {
    /// Reader that returns the EIP-1271 magic value, ABI-padded to 32 bytes
    pub fn accepting() -> Self {
        let mut word = [0u8; 32];
        word[..4].copy_from_slice(&EIP1271_MAGIC_VALUE);
        Self::returning(Bytes::copy_from_slice(&word))
    }

    /// Reader that returns a non-magic word
    pub fn rejecting() -> Self {
        Self::returning(Bytes::copy_from_slice(&[0xff; 32]))
    }

    /// Reader whose every call fails with an RPC error
    pub fn failing(message: &str) -> Self {
        Self::with_response(MockResponse::Fail(message.to_string()))
    }

    pub fn returning(output: Bytes) -> Self {
        Self::with_response(MockResponse::Output(output))
    }

    fn with_response(response: MockResponse) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
            last_call: Mutex::new(None),
        }
    }

    /// Number of calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent call
    pub fn last_call(&self) -> Option<(u64, Address, Bytes)> {
        self.last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ContractReader for MockContractReader {
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((chain_id, to, data));
        match &self.response {
            MockResponse::Output(output) => Ok(output.clone()),
            MockResponse::Fail(message) => Err(WalletAuthError::Rpc {
                code: -32000,
                message: message.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signer() {
        let address = Address::repeat_byte(0x11);
        let signer = MockWalletSigner::new(address, "0xmock_signature").with_chain_id(5);

        assert_eq!(signer.address(), address);
        assert_eq!(signer.chain_id().await, Some(5));

        let signature = signer.sign_message(b"test message").await.unwrap();
        assert_eq!(signature, "0xmock_signature");
    }

    #[tokio::test]
    async fn test_contract_fallback_requires_chain_id() {
        let address = Address::repeat_byte(0x22);
        let signature = format!("0x{}", "ab".repeat(65));
        let signer = MockWalletSigner::new(address, &signature)
            .with_contract_reader(MockContractReader::accepting());

        assert!(!signer.verify_signature(b"msg", &signature, address, None).await);
        assert!(signer.verify_signature(b"msg", &signature, address, Some(1)).await);
    }

    #[tokio::test]
    async fn test_failing_reader_is_not_valid() {
        let address = Address::repeat_byte(0x33);
        let signature = format!("0x{}", "cd".repeat(65));
        let signer = MockWalletSigner::new(address, &signature)
            .with_contract_reader(MockContractReader::failing("boom"));

        assert!(!signer.verify_signature(b"msg", &signature, address, Some(1)).await);
    }
}
