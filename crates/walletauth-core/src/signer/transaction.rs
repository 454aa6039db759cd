/*
[INPUT]:  TransactionRequest, digest signer, optional chain providers
[OUTPUT]: EIP-2718 encoded signed transactions and broadcast hashes
[POS]:    Signer layer - transaction path shared by local and KMS signers
[UPDATE]: When supporting new envelope types or fee estimation rules
*/

use alloy::network::TransactionBuilder;
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest as RpcTransactionRequest;
use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{B256, Bytes, Signature, TxKind, U256};
use tracing::{debug, info};

use crate::error::{Result, WalletAuthError};
use crate::rpc::ChainRpc;
use crate::signer::kms::DigestSigner;
use crate::types::TransactionRequest;

/// Unsigned transaction ready for signing
#[derive(Debug, Clone, PartialEq)]
pub enum UnsignedTransaction {
    Legacy(TxLegacy),
    Eip1559(TxEip1559),
}

impl UnsignedTransaction {
    /// Build from a complete request
    pub fn from_request(tx: &TransactionRequest, chain_id: u64) -> Result<Self> {
        if !tx.is_complete() {
            return Err(WalletAuthError::InvalidPayload(
                "transaction is missing nonce, gas or fee fields".into(),
            ));
        }

        let to = tx.to.map(TxKind::Call).unwrap_or(TxKind::Create);
        let nonce = to_u64(tx.nonce, "nonce")?;
        let gas_limit = to_u64(tx.gas, "gas")?;
        let value = tx.value.unwrap_or_default();
        let input = tx.data.clone().unwrap_or_default();

        if tx.is_eip1559() {
            Ok(Self::Eip1559(TxEip1559 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas: to_u128(tx.max_fee_per_gas, "maxFeePerGas")?,
                max_priority_fee_per_gas: to_u128(
                    tx.max_priority_fee_per_gas,
                    "maxPriorityFeePerGas",
                )?,
                to,
                value,
                input,
                ..Default::default()
            }))
        } else {
            Ok(Self::Legacy(TxLegacy {
                chain_id: Some(chain_id),
                nonce,
                gas_price: to_u128(tx.gas_price, "gasPrice")?,
                gas_limit,
                to,
                value,
                input,
            }))
        }
    }

    pub fn signature_hash(&self) -> B256 {
        match self {
            Self::Legacy(tx) => tx.signature_hash(),
            Self::Eip1559(tx) => tx.signature_hash(),
        }
    }

    /// Attach the signature and encode as EIP-2718 bytes
    pub fn encode_signed(self, signature: Signature) -> Bytes {
        let envelope = match self {
            Self::Legacy(tx) => TxEnvelope::from(tx.into_signed(signature)),
            Self::Eip1559(tx) => TxEnvelope::from(tx.into_signed(signature)),
        };
        Bytes::from(envelope.encoded_2718())
    }
}

/// Chain id from the request, falling back to the signer's configured chain
pub fn resolve_chain_id(tx: &TransactionRequest, fallback: Option<u64>) -> Result<u64> {
    match tx.chain_id {
        Some(chain_id) => u64::try_from(chain_id)
            .map_err(|_| WalletAuthError::InvalidPayload("chainId out of range".into())),
        None => fallback.ok_or_else(|| {
            WalletAuthError::InvalidPayload("transaction has no chain id".into())
        }),
    }
}

/// Fill nonce, gas and fees from the chain
///
/// Fees come from the provider's EIP-1559 estimator unless the request
/// carries a legacy gas price.
pub async fn prepare_transaction(
    provider: &DynProvider,
    signer: &dyn DigestSigner,
    tx: &TransactionRequest,
) -> Result<TransactionRequest> {
    let from = signer.address();
    let mut filled = tx.clone();
    filled.from = Some(from);

    if filled.nonce.is_none() {
        let nonce = provider.get_transaction_count(from).pending().await?;
        filled.nonce = Some(U256::from(nonce));
    }
    if filled.gas.is_none() {
        let gas = provider.estimate_gas(rpc_request(&filled)).await?;
        filled.gas = Some(U256::from(gas));
    }
    if filled.gas_price.is_none()
        && (filled.max_fee_per_gas.is_none() || filled.max_priority_fee_per_gas.is_none())
    {
        let fees = provider.estimate_eip1559_fees().await?;
        if filled.max_fee_per_gas.is_none() {
            filled.max_fee_per_gas = Some(U256::from(fees.max_fee_per_gas));
        }
        if filled.max_priority_fee_per_gas.is_none() {
            filled.max_priority_fee_per_gas = Some(U256::from(fees.max_priority_fee_per_gas));
        }
    }

    debug!(from = %from, nonce = ?filled.nonce, gas = ?filled.gas, "transaction prepared");
    Ok(filled)
}

/// Sign a transaction, filling missing fields from RPC when available
pub async fn sign_transaction(
    signer: &dyn DigestSigner,
    rpc: Option<&ChainRpc>,
    tx: &TransactionRequest,
    fallback_chain_id: Option<u64>,
) -> Result<Bytes> {
    check_sender(signer, tx)?;
    let chain_id = resolve_chain_id(tx, fallback_chain_id)?;

    let complete = match (tx.is_complete(), rpc) {
        (true, _) => tx.clone(),
        (false, Some(rpc)) => prepare_transaction(rpc.provider(chain_id)?, signer, tx).await?,
        (false, None) => tx.clone(),
    };

    let unsigned = UnsignedTransaction::from_request(&complete, chain_id)?;
    let signature = signer.sign_hash(&unsigned.signature_hash()).await?;
    Ok(unsigned.encode_signed(signature))
}

/// Sign and broadcast a transaction, returning its hash
pub async fn send_transaction(
    signer: &dyn DigestSigner,
    rpc: &ChainRpc,
    tx: &TransactionRequest,
    fallback_chain_id: Option<u64>,
) -> Result<B256> {
    let chain_id = resolve_chain_id(tx, fallback_chain_id)?;
    let raw = sign_transaction(signer, Some(rpc), tx, Some(chain_id)).await?;
    let pending = rpc.provider(chain_id)?.send_raw_transaction(&raw).await?;
    let hash = *pending.tx_hash();
    info!(chain_id, tx_hash = %hash, "transaction broadcast");
    Ok(hash)
}

/// Request shape the provider uses for gas estimation
fn rpc_request(tx: &TransactionRequest) -> RpcTransactionRequest {
    let mut request = RpcTransactionRequest::default();
    if let Some(from) = tx.from {
        request = request.with_from(from);
    }
    if let Some(to) = tx.to {
        request = request.with_to(to);
    }
    if let Some(value) = tx.value {
        request = request.with_value(value);
    }
    if let Some(data) = &tx.data {
        request = request.with_input(data.clone());
    }
    request
}

fn check_sender(signer: &dyn DigestSigner, tx: &TransactionRequest) -> Result<()> {
    match tx.from {
        Some(from) if from != signer.address() => Err(WalletAuthError::InvalidPayload(format!(
            "transaction sender {from} is not the signer {}",
            signer.address()
        ))),
        _ => Ok(()),
    }
}

fn to_u64(value: Option<U256>, field: &str) -> Result<u64> {
    let value = value.unwrap_or_default();
    u64::try_from(value)
        .map_err(|_| WalletAuthError::InvalidPayload(format!("{field} out of range")))
}

fn to_u128(value: Option<U256>, field: &str) -> Result<u128> {
    let value = value.unwrap_or_default();
    u128::try_from(value)
        .map_err(|_| WalletAuthError::InvalidPayload(format!("{field} out of range")))
}
