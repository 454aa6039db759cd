/*
[INPUT]:  Key material or remote signing backends
[OUTPUT]: WalletSigner capability set and the sealed set of signer variants
[POS]:    Signer layer - foundation every protocol layer depends on
[UPDATE]: When adding signer variants or changing the signer contract
*/

pub mod custodial;
pub mod kms;
pub mod local;
pub mod mock;
pub mod transaction;
pub mod verify;

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::error::{Result, WalletAuthError};
use crate::rpc::ContractReader;
use crate::types::TransactionRequest;

pub use custodial::{CustodialConfig, CustodialSigner, PollPolicy};
pub use kms::{DigestSigner, KmsSigner};
pub use local::LocalSigner;
pub use mock::{MockContractReader, MockWalletSigner};

/// Trait for wallet signing operations
///
/// The trait is async to support hardware wallets and external signers.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Get the wallet address
    fn address(&self) -> Address;

    /// Chain the signer is connected to, if known
    ///
    /// Best-effort: callers must tolerate `None`.
    async fn chain_id(&self) -> Option<u64> {
        None
    }

    /// Sign a personal message and return the 0x-prefixed 65-byte signature
    async fn sign_message(&self, message: &[u8]) -> Result<String>;

    /// Contract reader used for the EIP-1271 fallback
    fn contract_reader(&self) -> Option<&dyn ContractReader> {
        None
    }

    /// Check that `signature` over `message` was produced by `address`
    ///
    /// Never fails: malformed input and RPC errors count as invalid.
    async fn verify_signature(
        &self,
        message: &[u8],
        signature: &str,
        address: Address,
        chain_id: Option<u64>,
    ) -> bool {
        verify::verify_signature(message, signature, address, chain_id, self.contract_reader())
            .await
    }

    /// Sign a transaction and return the raw encoded bytes as hex
    async fn sign_transaction(&self, _tx: &TransactionRequest) -> Result<String> {
        Err(WalletAuthError::Unsupported("sign_transaction".into()))
    }

    /// Submit a transaction and wait for its hash
    async fn send_transaction(&self, _tx: &TransactionRequest) -> Result<String> {
        Err(WalletAuthError::Unsupported("send_transaction".into()))
    }
}

/// The closed set of signer backends, selected at construction time
#[derive(Debug, Clone)]
pub enum AnySigner {
    Local(LocalSigner),
    Custodial(CustodialSigner),
    Kms(KmsSigner),
}

impl AnySigner {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Custodial(_) => "custodial",
            Self::Kms(_) => "kms",
        }
    }

    fn as_signer(&self) -> &dyn WalletSigner {
        match self {
            Self::Local(signer) => signer,
            Self::Custodial(signer) => signer,
            Self::Kms(signer) => signer,
        }
    }
}

impl From<LocalSigner> for AnySigner {
    fn from(signer: LocalSigner) -> Self {
        Self::Local(signer)
    }
}

impl From<CustodialSigner> for AnySigner {
    fn from(signer: CustodialSigner) -> Self {
        Self::Custodial(signer)
    }
}

impl From<KmsSigner> for AnySigner {
    fn from(signer: KmsSigner) -> Self {
        Self::Kms(signer)
    }
}

#[async_trait]
impl WalletSigner for AnySigner {
    fn address(&self) -> Address {
        self.as_signer().address()
    }

    async fn chain_id(&self) -> Option<u64> {
        self.as_signer().chain_id().await
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String> {
        self.as_signer().sign_message(message).await
    }

    fn contract_reader(&self) -> Option<&dyn ContractReader> {
        self.as_signer().contract_reader()
    }

    async fn verify_signature(
        &self,
        message: &[u8],
        signature: &str,
        address: Address,
        chain_id: Option<u64>,
    ) -> bool {
        self.as_signer()
            .verify_signature(message, signature, address, chain_id)
            .await
    }

    async fn sign_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        self.as_signer().sign_transaction(tx).await
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        self.as_signer().send_transaction(tx).await
    }
}
