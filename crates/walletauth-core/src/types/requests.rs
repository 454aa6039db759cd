/*
[INPUT]:  JSON-RPC transaction objects from relay peers and callers
[OUTPUT]: Typed transaction request with hex quantity handling
[POS]:    Data layer - transaction path shared by all signer variants
[UPDATE]: When supporting new transaction fields or envelope types
*/

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Transaction as sent over `eth_sendTransaction` / `eth_signTransaction`
///
/// Missing fields are filled from chain RPC before signing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, alias = "input", skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, alias = "gasLimit", skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<U256>,
}

impl TransactionRequest {
    /// True when the request carries EIP-1559 fee fields
    pub fn is_eip1559(&self) -> bool {
        self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some()
    }

    /// True when nonce, gas and fee fields are all present
    pub fn is_complete(&self) -> bool {
        let fees = if self.is_eip1559() {
            self.max_fee_per_gas.is_some() && self.max_priority_fee_per_gas.is_some()
        } else {
            self.gas_price.is_some()
        };
        self.nonce.is_some() && self.gas.is_some() && fees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_relay_transaction() {
        let tx: TransactionRequest = serde_json::from_value(serde_json::json!({
            "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "to": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "value": "0xde0b6b3a7640000",
            "data": "0x",
            "gasLimit": "0x5208",
        }))
        .unwrap();

        assert_eq!(tx.value, Some(U256::from(1_000_000_000_000_000_000u128)));
        assert_eq!(tx.gas, Some(U256::from(21_000u64)));
        assert!(!tx.is_eip1559());
        assert!(!tx.is_complete());
    }

    #[test]
    fn test_is_complete_eip1559() {
        let tx = TransactionRequest {
            nonce: Some(U256::from(1u64)),
            gas: Some(U256::from(21_000u64)),
            max_fee_per_gas: Some(U256::from(2u64)),
            max_priority_fee_per_gas: Some(U256::from(1u64)),
            ..Default::default()
        };
        assert!(tx.is_eip1559());
        assert!(tx.is_complete());
    }
}
