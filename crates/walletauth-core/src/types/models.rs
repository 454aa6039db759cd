/*
[INPUT]:  Wire schema definitions and serde requirements
[OUTPUT]: Login payload, session claims and key record structs
[POS]:    Data layer - core protocol data model
[UPDATE]: When payload fields, claim names or key record layout change
*/

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AccountType, WalletStrategy};

pub const DEFAULT_STATEMENT: &str =
    "Please ensure that the domain above matches the URL of the current website.";
pub const DEFAULT_VERSION: &str = "1";

/// Unsigned login challenge
///
/// Timestamps stay in their ISO-8601 string form so the canonical message can be
/// rebuilt byte-for-byte from whatever the holder signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayloadData {
    #[serde(rename = "type", default)]
    pub account_type: AccountType,
    pub domain: String,
    pub address: String,
    #[serde(default = "default_statement")]
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default = "default_nonce")]
    pub nonce: String,
    #[serde(default = "default_timestamp")]
    pub issued_at: String,
    pub expiration_time: String,
    #[serde(default = "default_timestamp")]
    pub invalid_before: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
}

/// Signed login challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
    pub payload: LoginPayloadData,
    pub signature: String,
}

/// Session token claims
///
/// Field order is the canonical serialization order; the token signature covers
/// exactly `serde_json::to_string` of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationPayloadData {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    #[serde(default = "default_nonce")]
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx: Option<serde_json::Value>,
}

/// Persisted key material record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletData {
    pub address: String,
    pub strategy: WalletStrategy,
    pub data: String,
    pub is_encrypted: bool,
}

fn default_statement() -> String {
    DEFAULT_STATEMENT.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

/// Fresh unique id for nonces and token ids
pub fn default_nonce() -> String {
    Uuid::new_v4().to_string()
}

fn default_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn format_timestamp(time: chrono::DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
