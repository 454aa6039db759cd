/*
[INPUT]:  Wire schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - tag enums shared by login payloads and key records
[UPDATE]: When adding account kinds or key persistence strategies
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chain family the login challenge is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Evm,
    Solana,
}

impl AccountType {
    /// Account name used in the login message header
    pub fn header_name(self) -> &'static str {
        match self {
            AccountType::Evm => "Ethereum",
            AccountType::Solana => "Solana",
        }
    }

    pub fn from_header_name(name: &str) -> Option<Self> {
        match name {
            "Ethereum" => Some(AccountType::Evm),
            "Solana" => Some(AccountType::Solana),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Evm => f.write_str("evm"),
            AccountType::Solana => f.write_str("solana"),
        }
    }
}

/// How key material is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletStrategy {
    #[serde(rename = "privateKey")]
    PrivateKey,
    #[serde(rename = "mnemonic")]
    Mnemonic,
    #[serde(rename = "encryptedJson")]
    EncryptedJson,
}

impl fmt::Display for WalletStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletStrategy::PrivateKey => f.write_str("privateKey"),
            WalletStrategy::Mnemonic => f.write_str("mnemonic"),
            WalletStrategy::EncryptedJson => f.write_str("encryptedJson"),
        }
    }
}
