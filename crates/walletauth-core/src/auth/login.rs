/*
[INPUT]:  Wallet signer, login options, signed login payloads
[OUTPUT]: Canonical login messages, signed payloads, verified addresses
[POS]:    Auth layer - domain-bound challenge/response login protocol
[UPDATE]: When the login message layout or verification order changes
*/

use std::sync::Arc;

use alloy_primitives::Address;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::auth::validator::Validator;
use crate::error::{Result, WalletAuthError};
use crate::signer::WalletSigner;
use crate::types::{
    AccountType, DEFAULT_STATEMENT, DEFAULT_VERSION, LoginPayload, LoginPayloadData,
    default_nonce, format_timestamp,
};

const HEADER_SUFFIX: &str = " account:";
const HEADER_INFIX: &str = " wants you to sign in with your ";

/// Login lifetime when the caller does not set an expiration
pub const DEFAULT_LOGIN_TTL_SECS: i64 = 5 * 60;

/// Options for building a login payload
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    pub account_type: AccountType,
    pub domain: String,
    pub statement: Option<String>,
    pub uri: Option<String>,
    pub version: Option<String>,
    /// Taken from the signer when not set
    pub chain_id: Option<String>,
    pub nonce: Option<String>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub invalid_before: Option<DateTime<Utc>>,
    pub resources: Option<Vec<String>>,
}

impl LoginOptions {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            ..Default::default()
        }
    }
}

/// Expectations checked by `verify`
///
/// Unset optional fields are not checked.
#[derive(Clone, Default)]
pub struct VerifyOptions {
    pub account_type: AccountType,
    pub domain: String,
    pub statement: Option<String>,
    pub uri: Option<String>,
    pub version: Option<String>,
    pub chain_id: Option<String>,
    pub validate_nonce: Option<Arc<dyn Validator>>,
    /// Every listed resource must appear in the payload
    pub resources: Option<Vec<String>>,
}

impl VerifyOptions {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            ..Default::default()
        }
    }

    pub fn with_nonce_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validate_nonce = Some(validator);
        self
    }
}

/// Build an unsigned login payload for the signer's address
///
/// A chain id the signer cannot report is left unset.
pub async fn build(signer: &dyn WalletSigner, options: &LoginOptions) -> Result<LoginPayloadData> {
    let now = Utc::now();
    let invalid_before = options.invalid_before.unwrap_or(now);
    let expiration_time = options
        .expiration_time
        .unwrap_or_else(|| now + Duration::seconds(DEFAULT_LOGIN_TTL_SECS));

    if invalid_before > now {
        return Err(WalletAuthError::InvalidPayload(
            "invalid_before must not be later than issued_at".into(),
        ));
    }
    if expiration_time <= invalid_before {
        return Err(WalletAuthError::InvalidPayload(
            "expiration_time must be after invalid_before".into(),
        ));
    }

    let chain_id = match &options.chain_id {
        Some(chain_id) => Some(chain_id.clone()),
        None => signer.chain_id().await.map(|id| id.to_string()),
    };

    Ok(LoginPayloadData {
        account_type: options.account_type,
        domain: options.domain.clone(),
        address: signer.address().to_checksum(None),
        statement: options
            .statement
            .clone()
            .unwrap_or_else(|| DEFAULT_STATEMENT.to_string()),
        uri: options.uri.clone(),
        version: options
            .version
            .clone()
            .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        chain_id,
        nonce: options.nonce.clone().unwrap_or_else(default_nonce),
        issued_at: format_timestamp(now),
        expiration_time: format_timestamp(expiration_time),
        invalid_before: format_timestamp(invalid_before),
        resources: options.resources.clone(),
    })
}

/// Sign the canonical message of a payload
pub async fn sign(signer: &dyn WalletSigner, payload: LoginPayloadData) -> Result<LoginPayload> {
    let message = create_login_message(&payload);
    let signature = signer.sign_message(message.as_bytes()).await?;
    Ok(LoginPayload { payload, signature })
}

/// Build and sign in one step
pub async fn login(signer: &dyn WalletSigner, options: &LoginOptions) -> Result<LoginPayload> {
    let payload = build(signer, options).await?;
    let signed = sign(signer, payload).await?;
    debug!(domain = %signed.payload.domain, nonce = %signed.payload.nonce, "login payload signed");
    Ok(signed)
}

/// Verify a signed login payload and return the lowercase address
///
/// Checks run in a fixed order and stop at the first failure.
pub async fn verify(
    signer: &dyn WalletSigner,
    payload: &LoginPayload,
    options: &VerifyOptions,
) -> Result<String> {
    let data = &payload.payload;

    let address: Address = data
        .address
        .parse()
        .map_err(|_| WalletAuthError::InvalidAddress(data.address.clone()))?;
    parse_timestamp(&data.issued_at, "issued_at")?;
    let expiration_time = parse_timestamp(&data.expiration_time, "expiration_time")?;
    let invalid_before = parse_timestamp(&data.invalid_before, "invalid_before")?;

    if data.account_type != options.account_type {
        return Err(WalletAuthError::AccountTypeMismatch {
            expected: options.account_type.to_string(),
            found: data.account_type.to_string(),
        });
    }

    if data.domain != options.domain {
        return Err(WalletAuthError::DomainMismatch {
            expected: options.domain.clone(),
            found: data.domain.clone(),
        });
    }

    if let Some(statement) = options.statement.as_ref().filter(|s| **s != data.statement) {
        return Err(WalletAuthError::StatementMismatch {
            expected: statement.clone(),
            found: data.statement.clone(),
        });
    }

    if let Some(uri) = options.uri.as_ref().filter(|u| Some(*u) != data.uri.as_ref()) {
        return Err(WalletAuthError::UriMismatch {
            expected: uri.clone(),
            found: data.uri.clone().unwrap_or_default(),
        });
    }

    if let Some(version) = options.version.as_ref().filter(|v| **v != data.version) {
        return Err(WalletAuthError::VersionMismatch {
            expected: version.clone(),
            found: data.version.clone(),
        });
    }

    if let Some(chain_id) = options
        .chain_id
        .as_ref()
        .filter(|id| Some(*id) != data.chain_id.as_ref())
    {
        return Err(WalletAuthError::ChainIdMismatch {
            expected: chain_id.clone(),
            found: data.chain_id.clone().unwrap_or_default(),
        });
    }

    if let Some(validator) = &options.validate_nonce {
        if validator.validate(&data.nonce).await.is_err() {
            return Err(WalletAuthError::InvalidNonce);
        }
    }

    let checked = check_window_and_signature(
        signer,
        payload,
        options,
        address,
        invalid_before,
        expiration_time,
    )
    .await;
    if let Err(err) = checked {
        if let Some(validator) = &options.validate_nonce {
            validator.forget(&data.nonce).await;
        }
        return Err(err);
    }

    let verified = format!("0x{}", hex::encode(address.as_slice()));
    info!(address = %verified, domain = %data.domain, "login verified");
    Ok(verified)
}

/// Checks that run after the nonce has been accepted
async fn check_window_and_signature(
    signer: &dyn WalletSigner,
    payload: &LoginPayload,
    options: &VerifyOptions,
    address: Address,
    invalid_before: DateTime<Utc>,
    expiration_time: DateTime<Utc>,
) -> Result<()> {
    let data = &payload.payload;
    let now = Utc::now();
    if now < invalid_before {
        return Err(WalletAuthError::LoginNotYetValid);
    }
    if now > expiration_time {
        return Err(WalletAuthError::LoginExpired);
    }

    if let Some(required) = &options.resources {
        let present = data.resources.as_deref().unwrap_or_default();
        let missing: Vec<String> = required
            .iter()
            .filter(|resource| !present.contains(*resource))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(WalletAuthError::MissingResources(missing));
        }
    }

    let chain_id = options
        .chain_id
        .as_deref()
        .or(data.chain_id.as_deref())
        .and_then(|id| id.parse::<u64>().ok());
    let message = create_login_message(data);
    if !signer
        .verify_signature(message.as_bytes(), &payload.signature, address, chain_id)
        .await
    {
        return Err(WalletAuthError::SignatureMismatch(data.address.clone()));
    }

    Ok(())
}

/// Render the canonical login message
///
/// The layout is part of the wire contract: any change breaks existing signatures.
/// Timestamps are written exactly as stored in the payload.
pub fn create_login_message(payload: &LoginPayloadData) -> String {
    let mut prefix = format!(
        "{}{HEADER_INFIX}{}{HEADER_SUFFIX}\n{}",
        payload.domain,
        payload.account_type.header_name(),
        payload.address
    );
    prefix.push_str("\n\n");
    prefix.push_str(&payload.statement);
    if !payload.statement.is_empty() {
        prefix.push('\n');
    }

    let mut suffix = Vec::new();
    if let Some(uri) = &payload.uri {
        suffix.push(format!("URI: {uri}"));
    }
    suffix.push(format!("Version: {}", payload.version));
    if let Some(chain_id) = payload.chain_id.as_deref().filter(|id| !id.is_empty()) {
        suffix.push(format!("Chain ID: {chain_id}"));
    }
    suffix.push(format!("Nonce: {}", payload.nonce));
    suffix.push(format!("Issued At: {}", payload.issued_at));
    suffix.push(format!("Expiration Time: {}", payload.expiration_time));
    if !payload.invalid_before.is_empty() {
        suffix.push(format!("Not Before: {}", payload.invalid_before));
    }
    if let Some(resources) = &payload.resources {
        suffix.push("Resources:".to_string());
        suffix.extend(resources.iter().map(|resource| format!("- {resource}")));
    }

    format!("{prefix}\n{}", suffix.join("\n"))
}

/// Reconstruct a payload from its canonical message
pub fn parse_login_message(message: &str) -> Result<LoginPayloadData> {
    let lines: Vec<&str> = message.lines().collect();
    if lines.len() < 2 {
        return Err(invalid_message("message must include header and address"));
    }

    let header = lines[0]
        .strip_suffix(HEADER_SUFFIX)
        .ok_or_else(|| invalid_message("invalid header line"))?;
    let (domain, account) = header
        .split_once(HEADER_INFIX)
        .ok_or_else(|| invalid_message("invalid header line"))?;
    if domain.is_empty() {
        return Err(invalid_message("missing domain"));
    }
    let account_type = AccountType::from_header_name(account)
        .ok_or_else(|| invalid_message("unknown account type"))?;
    let address = lines[1].trim().to_string();

    let mut index = 2;
    while index < lines.len() && lines[index].trim().is_empty() {
        index += 1;
    }

    let mut statement = String::new();
    if index < lines.len() && !is_field_line(lines[index]) {
        statement = lines[index].to_string();
        index += 1;
    }

    let mut uri = None;
    let mut version = None;
    let mut chain_id = None;
    let mut nonce = None;
    let mut issued_at = None;
    let mut expiration_time = None;
    let mut invalid_before = None;
    let mut resources = None;

    while index < lines.len() {
        let line = lines[index];
        index += 1;
        if line.trim().is_empty() {
            continue;
        }
        if line == "Resources:" {
            let mut list = Vec::new();
            while index < lines.len() {
                match lines[index].strip_prefix("- ") {
                    Some(resource) => list.push(resource.to_string()),
                    None => break,
                }
                index += 1;
            }
            resources = Some(list);
            continue;
        }

        let (key, value) = line
            .split_once(": ")
            .ok_or_else(|| invalid_message("unexpected line"))?;
        let value = Some(value.to_string());
        match key {
            "URI" => uri = value,
            "Version" => version = value,
            "Chain ID" => chain_id = value,
            "Nonce" => nonce = value,
            "Issued At" => issued_at = value,
            "Expiration Time" => expiration_time = value,
            "Not Before" => invalid_before = value,
            _ => return Err(invalid_message("unknown field")),
        }
    }

    let issued_at = issued_at.ok_or_else(|| invalid_message("missing issued at"))?;
    Ok(LoginPayloadData {
        account_type,
        domain: domain.to_string(),
        address,
        statement,
        uri,
        version: version.ok_or_else(|| invalid_message("missing version"))?,
        chain_id,
        nonce: nonce.ok_or_else(|| invalid_message("missing nonce"))?,
        invalid_before: invalid_before.unwrap_or_else(|| issued_at.clone()),
        issued_at,
        expiration_time: expiration_time
            .ok_or_else(|| invalid_message("missing expiration time"))?,
        resources,
    })
}

fn is_field_line(line: &str) -> bool {
    line == "Resources:"
        || ["URI: ", "Version: ", "Chain ID: ", "Nonce: "]
            .iter()
            .any(|prefix| line.starts_with(prefix))
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|_| WalletAuthError::InvalidPayload(format!("{field} is not an ISO-8601 timestamp")))
}

fn invalid_message(reason: &str) -> WalletAuthError {
    WalletAuthError::InvalidPayload(format!("invalid login message: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> LoginPayloadData {
        LoginPayloadData {
            account_type: AccountType::Evm,
            domain: "app.example".into(),
            address: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".into(),
            statement: DEFAULT_STATEMENT.into(),
            uri: Some("https://app.example/login".into()),
            version: "1".into(),
            chain_id: Some("1".into()),
            nonce: "nonce-1".into(),
            issued_at: "2024-05-01T10:00:00.000Z".into(),
            expiration_time: "2024-05-01T10:05:00.000Z".into(),
            invalid_before: "2024-05-01T10:00:00.000Z".into(),
            resources: Some(vec!["https://app.example/a".into()]),
        }
    }

    #[test]
    fn test_message_layout() {
        let expected = "app.example wants you to sign in with your Ethereum account:\n\
            0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266\n\
            \n\
            Please ensure that the domain above matches the URL of the current website.\n\
            \n\
            URI: https://app.example/login\n\
            Version: 1\n\
            Chain ID: 1\n\
            Nonce: nonce-1\n\
            Issued At: 2024-05-01T10:00:00.000Z\n\
            Expiration Time: 2024-05-01T10:05:00.000Z\n\
            Not Before: 2024-05-01T10:00:00.000Z\n\
            Resources:\n\
            - https://app.example/a";
        assert_eq!(create_login_message(&payload()), expected);
    }

    #[test]
    fn test_message_omits_optional_lines() {
        let mut data = payload();
        data.uri = None;
        data.chain_id = None;
        data.resources = None;
        let message = create_login_message(&data);
        assert!(!message.contains("URI:"));
        assert!(!message.contains("Chain ID:"));
        assert!(!message.contains("Resources:"));
    }

    #[test]
    fn test_empty_resources_still_listed() {
        let mut data = payload();
        data.resources = Some(Vec::new());
        assert!(create_login_message(&data).ends_with("Resources:"));
    }

    #[test]
    fn test_timestamps_written_as_stored() {
        let mut data = payload();
        data.issued_at = "2024-05-01T10:00:00Z".into();
        data.invalid_before = "2024-05-01T12:00:00+02:00".into();
        let message = create_login_message(&data);
        assert!(message.contains("\nIssued At: 2024-05-01T10:00:00Z\n"));
        assert!(message.contains("\nNot Before: 2024-05-01T12:00:00+02:00"));
        assert_eq!(parse_login_message(&message).unwrap(), data);
    }

    #[test]
    fn test_parse_message_restores_payload() {
        let data = payload();
        let parsed = parse_login_message(&create_login_message(&data)).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn test_parse_message_empty_statement() {
        let mut data = payload();
        data.statement = String::new();
        let parsed = parse_login_message(&create_login_message(&data)).unwrap();
        assert_eq!(parsed.statement, "");
        assert_eq!(parsed.uri, data.uri);
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        assert!(parse_login_message("hello\n0xabc").is_err());
        assert!(parse_login_message("app wants you to sign in with your Bitcoin account:\n0x").is_err());
    }
}
