/*
[INPUT]:  EVM private key (hex string) or alloy PrivateKeySigner
[OUTPUT]: Signed messages, transactions and wallet address
[POS]:    Signer layer - raw-key signer variant
[UPDATE]: When signing logic or EVM address formatting changes
*/

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;

use crate::error::{Result, WalletAuthError};
use crate::rpc::{ChainRpc, ContractReader};
use crate::signer::{WalletSigner, transaction};
use crate::types::TransactionRequest;

/// Signer holding a raw secp256k1 key in memory
#[derive(Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
    chain_id: Option<u64>,
    rpc: Option<Arc<ChainRpc>>,
}

impl LocalSigner {
    /// Create a signer from a hex-encoded private key
    ///
    /// Supports both "0x"-prefixed and non-prefixed hex strings.
    pub fn from_private_key(private_key_hex: &str) -> Result<Self> {
        let private_key_hex = private_key_hex
            .strip_prefix("0x")
            .unwrap_or(private_key_hex);
        let inner = PrivateKeySigner::from_str(private_key_hex)
            .map_err(|_| WalletAuthError::InvalidPrivateKey)?;
        Ok(Self::from_signer(inner))
    }

    pub fn from_signer(inner: PrivateKeySigner) -> Self {
        Self {
            inner,
            chain_id: None,
            rpc: None,
        }
    }

    /// Generate a fresh random key
    pub fn random() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Attach chain RPC for contract-wallet verification and broadcasting
    pub fn with_rpc(mut self, rpc: Arc<ChainRpc>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    /// 0x-prefixed hex of the raw private key
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.inner.credential().to_bytes()))
    }

    pub fn inner(&self) -> &PrivateKeySigner {
        &self.inner
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.inner.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[async_trait]
impl WalletSigner for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String> {
        let signature = self
            .inner
            .sign_message(message)
            .await
            .map_err(|e| WalletAuthError::Signing(e.to_string()))?;

        // alloy's Signature as_bytes() returns [r, s, v]
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    fn contract_reader(&self) -> Option<&dyn ContractReader> {
        self.rpc.as_deref().map(|rpc| rpc as &dyn ContractReader)
    }

    async fn sign_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        let raw =
            transaction::sign_transaction(&self.inner, self.rpc.as_deref(), tx, self.chain_id)
                .await?;
        Ok(format!("0x{}", hex::encode(&raw)))
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        let rpc = self
            .rpc
            .as_deref()
            .ok_or_else(|| WalletAuthError::Unsupported("send_transaction without RPC".into()))?;
        let hash = transaction::send_transaction(&self.inner, rpc, tx, self.chain_id).await?;
        Ok(hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::verify;

    // A well-known test private key
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_local_signer() {
        let signer = LocalSigner::from_private_key(TEST_KEY).unwrap();
        assert_eq!(
            signer.address().to_checksum(None),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );

        let signature = signer.sign_message(b"hello").await.unwrap();
        assert!(signature.starts_with("0x"));
        assert_eq!(signature.len(), 132); // 0x + 65 bytes * 2 = 132
        assert_eq!(
            verify::recover_address(b"hello", &signature).unwrap(),
            signer.address()
        );
    }

    #[test]
    fn test_local_signer_no_prefix() {
        let signer = LocalSigner::from_private_key(&TEST_KEY[2..]).unwrap();
        assert_eq!(signer.private_key_hex(), TEST_KEY);
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(matches!(
            LocalSigner::from_private_key("0x1234"),
            Err(WalletAuthError::InvalidPrivateKey)
        ));
    }

    #[tokio::test]
    async fn test_chain_id_is_optional() {
        let signer = LocalSigner::random();
        assert_eq!(signer.chain_id().await, None);
        assert_eq!(signer.with_chain_id(10).chain_id().await, Some(10));
    }
}
