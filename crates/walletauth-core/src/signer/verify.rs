/*
[INPUT]:  Message bytes, hex signature, claimed address, optional chain id
[OUTPUT]: Valid/invalid verdict (never an error)
[POS]:    Signer layer - two-tier signature verification with EIP-1271 fallback
[UPDATE]: When changing recovery rules or contract-wallet fallback behavior
*/

use alloy_primitives::{Address, B256, Bytes, Signature, eip191_hash_message};
use alloy_sol_types::{SolCall, sol};
use tracing::{debug, warn};

use crate::error::{Result, WalletAuthError};
use crate::rpc::ContractReader;

/// `bytes4(keccak256("isValidSignature(bytes32,bytes)"))`
pub const EIP1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

sol! {
    function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4);
}

/// Decode a `0x`-prefixed (or bare) hex signature
pub fn decode_signature(signature: &str) -> Result<Vec<u8>> {
    let raw = signature.strip_prefix("0x").unwrap_or(signature);
    hex::decode(raw).map_err(|e| WalletAuthError::InvalidPayload(format!("signature is not hex: {e}")))
}

/// Personal-message hash of `message`
pub fn message_hash(message: &[u8]) -> B256 {
    eip191_hash_message(message)
}

/// Recover the signer address of an EIP-191 personal message
pub fn recover_address(message: &[u8], signature: &str) -> Result<Address> {
    let bytes = decode_signature(signature)?;
    let signature = Signature::try_from(bytes.as_slice())
        .map_err(|e| WalletAuthError::InvalidPayload(format!("malformed signature: {e}")))?;
    signature
        .recover_address_from_prehash(&message_hash(message))
        .map_err(|e| WalletAuthError::InvalidPayload(format!("signature recovery failed: {e}")))
}

/// Ask the contract at `address` whether `signature` is valid for `message`
pub async fn is_valid_contract_signature(
    reader: &dyn ContractReader,
    chain_id: u64,
    address: Address,
    message: &[u8],
    signature: &[u8],
) -> Result<bool> {
    let call = isValidSignatureCall {
        hash: message_hash(message),
        signature: Bytes::copy_from_slice(signature),
    };
    let output = reader
        .call(chain_id, address, Bytes::from(call.abi_encode()))
        .await?;
    Ok(output.len() >= 4 && output[..4] == EIP1271_MAGIC_VALUE)
}

/// Two-tier signature check
///
/// Tier one recovers the ECDSA signer of the personal-message hash. Tier two runs
/// only when recovery does not match, a chain id is supplied and a contract reader
/// is available; any failure there counts as "not valid".
pub async fn verify_signature(
    message: &[u8],
    signature: &str,
    address: Address,
    chain_id: Option<u64>,
    reader: Option<&dyn ContractReader>,
) -> bool {
    let bytes = match decode_signature(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let recovered = Signature::try_from(bytes.as_slice())
        .ok()
        .and_then(|parsed| parsed.recover_address_from_prehash(&message_hash(message)).ok());
    if recovered == Some(address) {
        debug!(%address, tier = "ecdsa", "signature verified");
        return true;
    }

    let (Some(chain_id), Some(reader)) = (chain_id, reader) else {
        debug!(%address, "ecdsa recovery mismatch, contract fallback unavailable");
        return false;
    };

    match is_valid_contract_signature(reader, chain_id, address, message, &bytes).await {
        Ok(valid) => {
            debug!(%address, chain_id, valid, tier = "eip1271", "contract signature check");
            valid
        }
        Err(e) => {
            warn!(%address, chain_id, error = %e, "contract signature check failed");
            false
        }
    }
}
