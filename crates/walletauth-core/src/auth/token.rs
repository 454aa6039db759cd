/*
[INPUT]:  Wallet signer, session claims, verified login payloads, tokens
[OUTPUT]: Signed session tokens and authenticated claim sets
[POS]:    Auth layer - self-issued session token lifecycle
[UPDATE]: When the token layout, claim checks or refresh rules change
*/

use std::sync::Arc;

use alloy_primitives::Address;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, STANDARD_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::login::{self, VerifyOptions};
use crate::auth::validator::Validator;
use crate::error::{Result, WalletAuthError};
use crate::signer::WalletSigner;
use crate::types::{AuthenticationPayloadData, LoginPayload, default_nonce};

/// Token lifetime when the caller does not set an expiration
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 5 * 60 * 60;

const TOKEN_HEADER: &str = r#"{"alg":"ES256","typ":"JWT"}"#;

/// Accepts segments with or without padding
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Produces the opaque `ctx` claim for a verified address
pub type SessionFn = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Decoded token segments, not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToken {
    pub claims: AuthenticationPayloadData,
    pub signature: String,
}

/// Options for `generate_token`
#[derive(Clone, Default)]
pub struct GenerateOptions {
    /// How to verify the login payload; its domain becomes `aud`
    pub verify: VerifyOptions,
    pub token_id: Option<String>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub invalid_before: Option<DateTime<Utc>>,
    pub session: Option<SessionFn>,
}

impl GenerateOptions {
    pub fn new(domain: &str) -> Self {
        Self {
            verify: VerifyOptions::new(domain),
            ..Default::default()
        }
    }
}

/// Options for `authenticate`
#[derive(Clone, Default)]
pub struct AuthenticateOptions {
    pub domain: String,
    /// Expected issuer; the connected signer's address when unset
    pub issuer_address: Option<String>,
    pub validate_token_id: Option<Arc<dyn Validator>>,
    /// Chain for the contract-wallet fallback when checking the signature
    pub chain_id: Option<u64>,
}

impl AuthenticateOptions {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            ..Default::default()
        }
    }
}

/// Claims that passed `authenticate`
///
/// Only `authenticate` constructs this, so `refresh` cannot be fed a raw token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedToken {
    claims: AuthenticationPayloadData,
}

impl AuthenticatedToken {
    /// Authenticated subject address
    pub fn address(&self) -> &str {
        &self.claims.sub
    }

    /// Opaque session context, if any
    pub fn session(&self) -> Option<&Value> {
        self.claims.ctx.as_ref()
    }

    pub fn claims(&self) -> &AuthenticationPayloadData {
        &self.claims
    }

    pub fn into_claims(self) -> AuthenticationPayloadData {
        self.claims
    }
}

/// Sign claims and assemble the three-segment token
///
/// Rejects claims that break `nbf <= iat <= exp`.
pub async fn issue(signer: &dyn WalletSigner, claims: &AuthenticationPayloadData) -> Result<String> {
    if claims.nbf > claims.iat || claims.iat > claims.exp {
        return Err(WalletAuthError::InvalidPayload(format!(
            "token times must satisfy nbf <= iat <= exp (nbf={}, iat={}, exp={})",
            claims.nbf, claims.iat, claims.exp
        )));
    }

    let payload = serde_json::to_string(claims)?;
    let signature = signer.sign_message(payload.as_bytes()).await?;

    Ok(format!(
        "{}.{}.{}",
        STANDARD.encode(TOKEN_HEADER),
        STANDARD_NO_PAD.encode(&payload),
        STANDARD.encode(&signature)
    ))
}

/// Decode a token without validating it
pub fn parse(token: &str) -> Result<ParsedToken> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, signature] = segments.as_slice() else {
        return Err(WalletAuthError::InvalidToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let payload = LENIENT
        .decode(payload)
        .map_err(|e| WalletAuthError::InvalidToken(format!("claims segment: {e}")))?;
    let claims: AuthenticationPayloadData = serde_json::from_slice(&payload)
        .map_err(|e| WalletAuthError::InvalidToken(format!("claims: {e}")))?;

    let signature = LENIENT
        .decode(signature)
        .map_err(|e| WalletAuthError::InvalidToken(format!("signature segment: {e}")))?;
    let signature = String::from_utf8(signature)
        .map_err(|_| WalletAuthError::InvalidToken("signature is not UTF-8".into()))?;

    Ok(ParsedToken { claims, signature })
}

/// Validate a token and return its claims
///
/// Checks run in a fixed order and stop at the first failure.
pub async fn authenticate(
    signer: &dyn WalletSigner,
    token: &str,
    options: &AuthenticateOptions,
) -> Result<AuthenticatedToken> {
    let ParsedToken { claims, signature } = parse(token)?;

    if let Some(validator) = &options.validate_token_id {
        if validator.validate(&claims.jti).await.is_err() {
            return Err(WalletAuthError::InvalidTokenId);
        }
    }

    if let Err(err) = check_claims(signer, &claims, &signature, options).await {
        if let Some(validator) = &options.validate_token_id {
            validator.forget(&claims.jti).await;
        }
        return Err(err);
    }

    debug!(sub = %claims.sub, jti = %claims.jti, "token authenticated");
    Ok(AuthenticatedToken { claims })
}

/// Checks that run after the token id has been accepted
async fn check_claims(
    signer: &dyn WalletSigner,
    claims: &AuthenticationPayloadData,
    signature: &str,
    options: &AuthenticateOptions,
) -> Result<()> {
    if claims.aud != options.domain {
        return Err(WalletAuthError::AudienceMismatch {
            expected: options.domain.clone(),
            found: claims.aud.clone(),
        });
    }

    let now = Utc::now().timestamp();
    if now < claims.nbf {
        return Err(WalletAuthError::TokenNotYetValid {
            nbf: claims.nbf,
            now,
        });
    }
    if now > claims.exp {
        return Err(WalletAuthError::TokenExpired {
            exp: claims.exp,
            now,
        });
    }

    let expected_issuer = options
        .issuer_address
        .clone()
        .unwrap_or_else(|| signer.address().to_checksum(None));
    if !expected_issuer.eq_ignore_ascii_case(&claims.iss) {
        return Err(WalletAuthError::IssuerMismatch {
            expected: expected_issuer,
            found: claims.iss.clone(),
        });
    }

    let issuer: Address = claims
        .iss
        .parse()
        .map_err(|_| WalletAuthError::InvalidAddress(claims.iss.clone()))?;
    let payload = serde_json::to_string(claims)?;
    if !signer
        .verify_signature(payload.as_bytes(), signature, issuer, options.chain_id)
        .await
    {
        return Err(WalletAuthError::TokenSignatureInvalid(claims.iss.clone()));
    }

    Ok(())
}

/// Re-issue an authenticated token with fresh times and id
///
/// Issuer, subject, audience and context are preserved.
pub async fn refresh(
    signer: &dyn WalletSigner,
    token: &AuthenticatedToken,
    expiration_time: Option<DateTime<Utc>>,
) -> Result<String> {
    let now = Utc::now();
    let exp = expiration_time.unwrap_or_else(|| now + Duration::seconds(DEFAULT_TOKEN_TTL_SECS));

    let claims = AuthenticationPayloadData {
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: exp.timestamp(),
        jti: default_nonce(),
        ..token.claims.clone()
    };
    let refreshed = issue(signer, &claims).await?;
    info!(sub = %claims.sub, jti = %claims.jti, exp = claims.exp, "token refreshed");
    Ok(refreshed)
}

/// Authenticate then refresh in one call
pub async fn authenticate_and_refresh(
    signer: &dyn WalletSigner,
    token: &str,
    options: &AuthenticateOptions,
    expiration_time: Option<DateTime<Utc>>,
) -> Result<String> {
    let authenticated = authenticate(signer, token, options).await?;
    refresh(signer, &authenticated, expiration_time).await
}

/// Verify a login payload and issue a session token for its address
pub async fn generate_token(
    signer: &dyn WalletSigner,
    payload: &LoginPayload,
    options: &GenerateOptions,
) -> Result<String> {
    let address = login::verify(signer, payload, &options.verify).await?;

    let now = Utc::now();
    let nbf = options.invalid_before.unwrap_or(now);
    let exp = options
        .expiration_time
        .unwrap_or_else(|| now + Duration::seconds(DEFAULT_TOKEN_TTL_SECS));
    let ctx = options.session.as_ref().and_then(|session| session(&address));

    let claims = AuthenticationPayloadData {
        iss: signer.address().to_checksum(None),
        sub: address,
        aud: options.verify.domain.clone(),
        exp: exp.timestamp(),
        nbf: nbf.timestamp(),
        iat: now.timestamp(),
        jti: options.token_id.clone().unwrap_or_else(default_nonce),
        ctx,
    };
    let token = issue(signer, &claims).await?;
    info!(sub = %claims.sub, aud = %claims.aud, jti = %claims.jti, "token issued");
    Ok(token)
}
