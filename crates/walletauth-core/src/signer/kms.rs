/*
[INPUT]:  Any digest-signing backend (hardware wallet, cloud KMS, local key)
[OUTPUT]: WalletSigner over a backend that only signs 32-byte digests
[POS]:    Signer layer - hardware/KMS signer variant
[UPDATE]: When adding backend capabilities or changing digest handling
*/

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Signature};
use async_trait::async_trait;

use crate::error::{Result, WalletAuthError};
use crate::rpc::{ChainRpc, ContractReader};
use crate::signer::{WalletSigner, transaction, verify};
use crate::types::TransactionRequest;

/// Backend that signs prehashed digests and never exposes its key
#[async_trait]
pub trait DigestSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_hash(&self, hash: &B256) -> Result<Signature>;
}

/// Every alloy signer (local key, Ledger, Trezor, AWS/GCP KMS) is a digest signer
#[async_trait]
impl<S> DigestSigner for S
where
    S: alloy_signer::Signer<Signature> + Send + Sync,
{
    fn address(&self) -> Address {
        alloy_signer::Signer::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature> {
        alloy_signer::Signer::sign_hash(self, hash)
            .await
            .map_err(|e| WalletAuthError::Signing(e.to_string()))
    }
}

/// Signer backed by a remote or hardware digest signer
#[derive(Clone)]
pub struct KmsSigner {
    backend: Arc<dyn DigestSigner>,
    chain_id: Option<u64>,
    rpc: Option<Arc<ChainRpc>>,
}

impl KmsSigner {
    pub fn new(backend: Arc<dyn DigestSigner>) -> Self {
        Self {
            backend,
            chain_id: None,
            rpc: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_rpc(mut self, rpc: Arc<ChainRpc>) -> Self {
        self.rpc = Some(rpc);
        self
    }
}

impl fmt::Debug for KmsSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsSigner")
            .field("address", &self.backend.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[async_trait]
impl WalletSigner for KmsSigner {
    fn address(&self) -> Address {
        self.backend.address()
    }

    async fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String> {
        let signature = self.backend.sign_hash(&verify::message_hash(message)).await?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    fn contract_reader(&self) -> Option<&dyn ContractReader> {
        self.rpc.as_deref().map(|rpc| rpc as &dyn ContractReader)
    }

    async fn sign_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        let raw = transaction::sign_transaction(
            self.backend.as_ref(),
            self.rpc.as_deref(),
            tx,
            self.chain_id,
        )
        .await?;
        Ok(format!("0x{}", hex::encode(&raw)))
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        let rpc = self
            .rpc
            .as_deref()
            .ok_or_else(|| WalletAuthError::Unsupported("send_transaction without RPC".into()))?;
        let hash =
            transaction::send_transaction(self.backend.as_ref(), rpc, tx, self.chain_id).await?;
        Ok(hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer_local::PrivateKeySigner;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_kms_signature_recovers() {
        let backend: PrivateKeySigner = TEST_KEY.parse().unwrap();
        let signer = KmsSigner::new(Arc::new(backend));

        let signature = signer.sign_message(b"kms message").await.unwrap();
        assert_eq!(signature.len(), 132);
        assert_eq!(
            verify::recover_address(b"kms message", &signature).unwrap(),
            signer.address()
        );
        assert!(
            signer
                .verify_signature(b"kms message", &signature, signer.address(), None)
                .await
        );
    }

    #[tokio::test]
    async fn test_send_without_rpc_is_unsupported() {
        let backend: PrivateKeySigner = TEST_KEY.parse().unwrap();
        let signer = KmsSigner::new(Arc::new(backend));
        let err = signer
            .send_transaction(&TransactionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletAuthError::Unsupported(_)));
    }
}
